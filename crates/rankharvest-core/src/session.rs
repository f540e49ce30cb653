use std::time::Duration;

use futures::future::join_all;

use crate::error::HarvestError;
use crate::extract::extract_records;
use crate::models::KeywordTask;
use crate::retry_queue::{RetryDecision, RetryQueue};
use crate::settle::{PollerConfig, SettlePoller};
use crate::traits::{PersistenceSink, RenderingSurface};

/// Where a session is in its per-task cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Polling,
    Persisting,
    Done,
}

/// Events emitted by a session for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SessionEvent<'a> {
    Started {
        worksheet: &'a str,
    },
    TaskClaimed {
        worksheet: &'a str,
        task: &'a KeywordTask,
    },
    TaskCompleted {
        worksheet: &'a str,
        keyword: &'a str,
        records: usize,
        write_errors: usize,
    },
    TaskFailed {
        worksheet: &'a str,
        keyword: &'a str,
        attempt: u32,
        error: &'a HarvestError,
        decision: RetryDecision,
    },
    WriteFailed {
        keyword: &'a str,
        position: u32,
        error: &'a HarvestError,
    },
    Done {
        worksheet: &'a str,
    },
}

/// Trait for receiving session events (decoupled logging).
pub trait SessionReporter: Send + Sync {
    fn report(&self, event: SessionEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSessionReporter;

impl SessionReporter for TracingSessionReporter {
    fn report(&self, event: SessionEvent<'_>) {
        match event {
            SessionEvent::Started { worksheet } => {
                tracing::info!(%worksheet, "Session started");
            }
            SessionEvent::TaskClaimed { worksheet, task } => {
                tracing::info!(%worksheet, keyword = %task.keyword, attempt = task.attempt, "Scraping");
            }
            SessionEvent::TaskCompleted {
                worksheet,
                keyword,
                records,
                write_errors,
            } => {
                tracing::info!(%worksheet, %keyword, %records, %write_errors, "Saved results");
            }
            SessionEvent::TaskFailed {
                worksheet,
                keyword,
                attempt,
                error,
                decision,
            } => match decision {
                RetryDecision::Requeued(next) => {
                    tracing::warn!(%worksheet, %keyword, %attempt, %error, next_attempt = next, "Keyword failed, requeued");
                }
                RetryDecision::Abandoned => {
                    tracing::error!(%worksheet, %keyword, %attempt, %error, "Keyword failed permanently");
                }
            },
            SessionEvent::WriteFailed {
                keyword,
                position,
                error,
            } => {
                tracing::error!(%keyword, %position, %error, "Failed to save result");
            }
            SessionEvent::Done { worksheet } => {
                tracing::info!(%worksheet, "Session done");
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Throttle between two keywords on the same session.
    pub request_delay: Duration,
    /// ISO-8601 date stamped on every record of this run.
    pub run_date: String,
    pub poller: PollerConfig,
}

/// Totals for one session, returned when it reaches `Done`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub worksheet: String,
    pub succeeded: usize,
    pub retried: usize,
    pub abandoned: usize,
    /// Failed attempts where the surface settled without data or never settled.
    pub settle_failures: usize,
    pub records_written: usize,
    pub write_errors: usize,
}

/// Pulls keywords from the shared retry queue and scrapes them one at a time
/// on a single rendering surface.
pub struct ScrapeSession<S, P>
where
    S: RenderingSurface,
    P: PersistenceSink,
{
    worksheet: String,
    surface: S,
    sink: P,
    queue: RetryQueue,
    poller: SettlePoller,
    request_delay: Duration,
    run_date: String,
    state: SessionState,
    current: Option<KeywordTask>,
}

impl<S, P> ScrapeSession<S, P>
where
    S: RenderingSurface,
    P: PersistenceSink,
{
    pub fn new(
        worksheet: impl Into<String>,
        surface: S,
        sink: P,
        queue: RetryQueue,
        config: SessionConfig,
    ) -> Self {
        Self {
            worksheet: worksheet.into(),
            surface,
            sink,
            queue,
            poller: SettlePoller::new(config.poller),
            request_delay: config.request_delay,
            run_date: config.run_date,
            state: SessionState::Idle,
            current: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The task being processed, if any.
    pub fn current(&self) -> Option<&KeywordTask> {
        self.current.as_ref()
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(worksheet = %self.worksheet, from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }

    /// Run until the shared queue is observed empty.
    ///
    /// Per-keyword failures go back to the retry queue and never end the loop.
    pub async fn run<R: SessionReporter>(&mut self, reporter: &R) -> SessionSummary {
        let mut summary = SessionSummary {
            worksheet: self.worksheet.clone(),
            ..SessionSummary::default()
        };

        reporter.report(SessionEvent::Started {
            worksheet: &self.worksheet,
        });

        loop {
            self.transition(SessionState::Idle);
            let Some(task) = self.queue.pop() else {
                break;
            };
            reporter.report(SessionEvent::TaskClaimed {
                worksheet: &self.worksheet,
                task: &task,
            });
            self.current = Some(task.clone());

            match self.process(&task, reporter).await {
                Ok((written, failed)) => {
                    summary.succeeded += 1;
                    summary.records_written += written;
                    summary.write_errors += failed;
                    self.queue.complete(&task);
                    reporter.report(SessionEvent::TaskCompleted {
                        worksheet: &self.worksheet,
                        keyword: &task.keyword,
                        records: written,
                        write_errors: failed,
                    });
                }
                Err(error) => {
                    let attempt = task.attempt;
                    let keyword = task.keyword.clone();
                    if error.is_settle_failure() {
                        summary.settle_failures += 1;
                    }
                    let decision = self.queue.retry_or_fail(task);
                    match decision {
                        RetryDecision::Requeued(_) => summary.retried += 1,
                        RetryDecision::Abandoned => summary.abandoned += 1,
                    }
                    reporter.report(SessionEvent::TaskFailed {
                        worksheet: &self.worksheet,
                        keyword: &keyword,
                        attempt,
                        error: &error,
                        decision,
                    });
                }
            }
            self.current = None;
        }

        self.transition(SessionState::Done);
        reporter.report(SessionEvent::Done {
            worksheet: &self.worksheet,
        });
        summary
    }

    /// Scrape one keyword. Returns `(records written, write failures)`.
    async fn process<R: SessionReporter>(
        &mut self,
        task: &KeywordTask,
        reporter: &R,
    ) -> Result<(usize, usize), HarvestError> {
        self.transition(SessionState::Loading);
        tokio::time::sleep(self.request_delay).await;

        self.transition(SessionState::Polling);
        let rows = self.poller.run(&self.surface, &task.keyword).await?;

        self.transition(SessionState::Persisting);
        let records = extract_records(&rows, &task.keyword, &task.group, &self.run_date);
        let writes: Vec<_> = records.iter().map(|record| self.sink.write(record)).collect();
        let results = join_all(writes).await;

        let mut failed = 0;
        for (record, result) in records.iter().zip(results) {
            if let Err(error) = result {
                failed += 1;
                reporter.report(SessionEvent::WriteFailed {
                    keyword: &task.keyword,
                    position: record.position,
                    error: &error,
                });
            }
        }

        Ok((records.len() - failed, failed))
    }
}
