pub mod elastic;
pub mod sheets;

pub use elastic::ElasticsearchSink;
pub use sheets::{SheetsConnector, SheetsSurface};
