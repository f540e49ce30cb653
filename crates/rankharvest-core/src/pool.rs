use std::sync::Arc;

use futures::future::join_all;

use crate::models::KeywordTask;
use crate::retry_queue::RetryQueue;
use crate::session::{ScrapeSession, SessionConfig, SessionReporter, SessionSummary};
use crate::traits::{PersistenceSink, SurfaceConnector};

/// A worksheet whose session never ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub worksheet: String,
    pub reason: String,
}

/// Aggregate result of a harvest run.
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    /// Sessions that reached `Done`, in worksheet order.
    pub sessions: Vec<SessionSummary>,
    /// Sessions that could not be constructed (e.g. authentication failed).
    pub construction_failures: Vec<SessionFailure>,
    /// Tasks that exhausted their attempts, in the order they were abandoned.
    pub failed_keywords: Vec<KeywordTask>,
    /// Tasks still queued at the end; only non-zero when no session ran.
    pub unprocessed: usize,
}

impl PoolReport {
    pub fn succeeded(&self) -> usize {
        self.sessions.iter().map(|s| s.succeeded).sum()
    }

    pub fn records_written(&self) -> usize {
        self.sessions.iter().map(|s| s.records_written).sum()
    }

    pub fn write_errors(&self) -> usize {
        self.sessions.iter().map(|s| s.write_errors).sum()
    }

    pub fn settle_failures(&self) -> usize {
        self.sessions.iter().map(|s| s.settle_failures).sum()
    }

    /// True when at least one worksheet was configured and none of them
    /// produced a running session.
    pub fn no_session_ran(&self) -> bool {
        self.sessions.is_empty() && !self.construction_failures.is_empty()
    }
}

/// Runs one scrape session per worksheet, all draining the same queue.
pub struct SessionPool<C, P>
where
    C: SurfaceConnector,
    P: PersistenceSink,
{
    connector: C,
    sink: P,
    queue: RetryQueue,
    worksheets: Vec<String>,
    config: SessionConfig,
}

impl<C, P> SessionPool<C, P>
where
    C: SurfaceConnector + 'static,
    C::Surface: 'static,
    P: PersistenceSink + 'static,
{
    pub fn new(
        connector: C,
        sink: P,
        queue: RetryQueue,
        worksheets: Vec<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            connector,
            sink,
            queue,
            worksheets,
            config,
        }
    }

    /// Run every session concurrently and resolve once all are done.
    ///
    /// A worksheet that fails to connect is reported and skipped; its
    /// siblings keep draining the queue.
    pub async fn run<R: SessionReporter + 'static>(&self, reporter: Arc<R>) -> PoolReport {
        let handles: Vec<_> = self
            .worksheets
            .iter()
            .map(|worksheet| {
                let worksheet = worksheet.clone();
                let connector = self.connector.clone();
                let sink = self.sink.clone();
                let queue = self.queue.clone();
                let config = self.config.clone();
                let reporter = Arc::clone(&reporter);

                tokio::spawn(async move {
                    tracing::info!(%worksheet, "Opening worksheet");
                    let surface = connector.connect(&worksheet).await.map_err(|e| {
                        tracing::error!(%worksheet, error = %e, "Could not open worksheet");
                        e.to_string()
                    })?;
                    let mut session = ScrapeSession::new(&worksheet, surface, sink, queue, config);
                    Ok::<_, String>(session.run(reporter.as_ref()).await)
                })
            })
            .collect();

        let mut report = PoolReport::default();
        for (worksheet, joined) in self.worksheets.iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(summary)) => report.sessions.push(summary),
                Ok(Err(reason)) => report.construction_failures.push(SessionFailure {
                    worksheet: worksheet.clone(),
                    reason,
                }),
                Err(e) => {
                    tracing::error!(%worksheet, error = %e, "Session task aborted");
                    report.construction_failures.push(SessionFailure {
                        worksheet: worksheet.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.failed_keywords = self.queue.failed();
        report.unprocessed = self.queue.len();

        tracing::info!(
            sessions = report.sessions.len(),
            succeeded = report.succeeded(),
            records = report.records_written(),
            write_errors = report.write_errors(),
            settle_failures = report.settle_failures(),
            failed = report.failed_keywords.len(),
            "Harvest finished"
        );
        for task in &report.failed_keywords {
            tracing::warn!(keyword = %task.keyword, group = %task.group, attempts = task.attempt, "Keyword failed permanently");
        }

        report
    }
}
