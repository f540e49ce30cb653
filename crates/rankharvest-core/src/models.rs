use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One keyword waiting to be scraped.
///
/// `attempt` starts at 1 and is only ever incremented when the task is
/// requeued after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTask {
    pub keyword: String,
    pub group: String,
    pub attempt: u32,
}

impl KeywordTask {
    pub fn new(keyword: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            group: group.into(),
            attempt: 1,
        }
    }

    /// The same task, one attempt later.
    pub fn next_attempt(&self) -> Self {
        Self {
            keyword: self.keyword.clone(),
            group: self.group.clone(),
            attempt: self.attempt + 1,
        }
    }
}

/// Raw `(title, url)` cells for one result position.
///
/// A `None` cell means the rendering surface returned nothing there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    pub title: Option<String>,
    pub url: Option<String>,
}

impl ResultRow {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
        }
    }

    /// A row whose URL cell is absent (end of data).
    pub fn title_only(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: None,
        }
    }
}

/// A single organic result, as written to the persistence sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub keyword: String,
    pub group: String,
    /// ISO-8601 timestamp of the harvest run.
    pub date: String,
    /// Bare `scheme://host` of the destination, empty when it could not be parsed.
    pub url: String,
    pub anchor_text: String,
    pub position: u32,
}

/// Format a harvest run date the way every record carries it
/// (millisecond precision, `Z` suffix).
pub fn run_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The marker strings a rendering surface writes into a cell instead of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinels {
    /// Shown while the computation is still running (locale dependent).
    pub loading: String,
    /// Shown when the computation finished without data.
    pub unavailable: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            loading: "Loading...".to_string(),
            unavailable: "#N/A".to_string(),
        }
    }
}

/// Outcome of one read of the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleStatus {
    Pending,
    Unavailable,
    Ready(Vec<ResultRow>),
}

impl SettleStatus {
    /// Classify a read by inspecting the watched cells (the first row's
    /// title and URL).
    ///
    /// This is the only place sentinel text is compared. A pending cell
    /// takes precedence over an unavailable one since the read is not final.
    pub fn classify(rows: Vec<ResultRow>, sentinels: &Sentinels) -> Self {
        let shows = |marker: &str| {
            rows.first().is_some_and(|row| {
                row.title.as_deref() == Some(marker) || row.url.as_deref() == Some(marker)
            })
        };
        let pending = shows(&sentinels.loading);
        let unavailable = shows(&sentinels.unavailable);

        if pending {
            SettleStatus::Pending
        } else if unavailable {
            SettleStatus::Unavailable
        } else {
            SettleStatus::Ready(rows)
        }
    }
}
