//! Drives one external computation until it settles.
//!
//! The rendering surface has no completion callback, so the poller submits the
//! query, waits, and re-reads the result region until the watched cells stop
//! showing the loading marker.
//!
//! By default polling is unbounded: a computation that never leaves the
//! loading state keeps its session polling forever. Set
//! [`PollerConfig::max_polls`] to turn that into a [`HarvestError::SettleTimeout`].

use std::time::Duration;

use crate::error::HarvestError;
use crate::models::{ResultRow, Sentinels, SettleStatus};
use crate::query::{QueryTemplate, TITLE_CELL, URL_CELL};
use crate::traits::RenderingSurface;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Wait between submitting the query and the first read.
    pub submit_delay: Duration,
    /// Wait between two reads while the computation is pending.
    pub poll_delay: Duration,
    /// Give up after this many pending reads. `None` polls forever.
    pub max_polls: Option<u32>,
    pub sentinels: Sentinels,
    pub template: QueryTemplate,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            submit_delay: Duration::from_secs(2),
            poll_delay: Duration::from_secs(2),
            max_polls: None,
            sentinels: Sentinels::default(),
            template: QueryTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettlePoller {
    config: PollerConfig,
}

impl SettlePoller {
    pub fn new(config: PollerConfig) -> Self {
        Self { config }
    }

    /// Submit the query for `keyword` and return the rows of the first
    /// settled read.
    ///
    /// Fails with [`HarvestError::DataUnavailable`] as soon as a read shows
    /// the unavailable marker; submit and read errors are returned as-is.
    pub async fn run<S: RenderingSurface>(
        &self,
        surface: &S,
        keyword: &str,
    ) -> Result<Vec<ResultRow>, HarvestError> {
        let template = &self.config.template;
        surface
            .submit(TITLE_CELL, &template.title_formula(keyword))
            .await?;
        surface
            .submit(URL_CELL, &template.url_formula(keyword))
            .await?;

        tokio::time::sleep(self.config.submit_delay).await;

        let mut polls = 0u32;
        loop {
            let rows = surface.read_cells(template.results_per_page).await?;
            polls += 1;

            match SettleStatus::classify(rows, &self.config.sentinels) {
                SettleStatus::Ready(rows) => {
                    tracing::debug!(%keyword, polls, rows = rows.len(), "Query settled");
                    return Ok(rows);
                }
                SettleStatus::Unavailable => return Err(HarvestError::DataUnavailable),
                SettleStatus::Pending => {
                    if self.config.max_polls.is_some_and(|max| polls >= max) {
                        return Err(HarvestError::SettleTimeout { polls });
                    }
                    tracing::debug!(%keyword, polls, "Still loading");
                    tokio::time::sleep(self.config.poll_delay).await;
                }
            }
        }
    }
}
