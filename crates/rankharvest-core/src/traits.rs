use std::future::Future;

use crate::error::HarvestError;
use crate::models::{ResultRecord, ResultRow};

/// A spreadsheet-like surface that evaluates a query formula asynchronously.
///
/// There is no completion callback: callers submit a query, then re-read the
/// result region until the cells stop showing a loading marker.
pub trait RenderingSurface: Send + Sync {
    /// Write a query formula into `cell`.
    ///
    /// Fails with [`HarvestError::Submit`] on network or auth problems.
    fn submit(
        &self,
        cell: &str,
        query: &str,
    ) -> impl Future<Output = Result<(), HarvestError>> + Send;

    /// Read the resolved values (not the formulas) of the first `max_rows`
    /// result rows.
    ///
    /// Rows are returned in position order; a trailing row may be shorter
    /// than the others.
    fn read_cells(
        &self,
        max_rows: u32,
    ) -> impl Future<Output = Result<Vec<ResultRow>, HarvestError>> + Send;
}

/// Opens an authenticated [`RenderingSurface`] for one worksheet.
///
/// The pool asks for one fresh handle per configured worksheet.
pub trait SurfaceConnector: Send + Sync + Clone {
    type Surface: RenderingSurface;

    fn connect(
        &self,
        worksheet: &str,
    ) -> impl Future<Output = Result<Self::Surface, HarvestError>> + Send;
}

/// Accepts finished result records. Writes are at-least-once.
pub trait PersistenceSink: Send + Sync + Clone {
    fn write(
        &self,
        record: &ResultRecord,
    ) -> impl Future<Output = Result<(), HarvestError>> + Send;
}

/// A sink that drops every record, for dry runs.
#[derive(Debug, Clone)]
pub struct NullSink;

impl PersistenceSink for NullSink {
    async fn write(&self, _record: &ResultRecord) -> Result<(), HarvestError> {
        Ok(())
    }
}
