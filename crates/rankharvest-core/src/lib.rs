pub mod config;
pub mod error;
pub mod extract;
pub mod keywords;
pub mod models;
pub mod pool;
pub mod query;
pub mod retry_queue;
pub mod session;
pub mod settle;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use config::HarvestConfig;
pub use error::HarvestError;
pub use models::{KeywordTask, ResultRecord, ResultRow, Sentinels, SettleStatus, run_date};
pub use pool::{PoolReport, SessionPool};
pub use retry_queue::{RetryPolicy, RetryQueue};
pub use session::{ScrapeSession, SessionReporter, TracingSessionReporter};
pub use traits::{NullSink, PersistenceSink, RenderingSurface, SurfaceConnector};
