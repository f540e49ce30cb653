use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::HarvestError;
use crate::models::Sentinels;
use crate::query::QueryTemplate;
use crate::retry_queue::RetryPolicy;
use crate::session::SessionConfig;
use crate::settle::PollerConfig;

/// Harvest configuration, loaded once at startup from a JSON file.
///
/// Credentials are not part of this file; they come from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Tab-separated `keyword<TAB>group` list.
    pub keywords_file: PathBuf,
    /// One scrape session runs per spreadsheet.
    pub spreadsheet_ids: Vec<String>,
    /// Sheet (tab) inside each spreadsheet that receives the formulas.
    pub worksheet_name: String,

    pub elasticsearch_url: String,
    pub elasticsearch_index: String,
    pub elasticsearch_doc_type: String,

    pub submit_delay_ms: u64,
    pub poll_delay_ms: u64,
    pub request_delay_ms: u64,
    pub max_attempts: u32,
    /// Cap on pending reads per attempt. Absent means poll until settled.
    pub max_polls: Option<u32>,

    pub loading_text: String,
    pub unavailable_text: String,

    pub results_per_page: u32,
    pub start_offset: u32,
    pub search_domain: String,
    pub title_xpath: String,
    pub url_xpath: String,
    pub formula_separator: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let template = QueryTemplate::default();
        let sentinels = Sentinels::default();
        Self {
            keywords_file: PathBuf::new(),
            spreadsheet_ids: Vec::new(),
            worksheet_name: "Sheet1".to_string(),
            elasticsearch_url: "http://localhost:9200".to_string(),
            elasticsearch_index: "rankings".to_string(),
            elasticsearch_doc_type: "_doc".to_string(),
            submit_delay_ms: 2_000,
            poll_delay_ms: 2_000,
            request_delay_ms: 1_000,
            max_attempts: RetryPolicy::default().max_attempts,
            max_polls: None,
            loading_text: sentinels.loading,
            unavailable_text: sentinels.unavailable,
            results_per_page: template.results_per_page,
            start_offset: template.start_offset,
            search_domain: template.search_domain,
            title_xpath: template.title_xpath,
            url_xpath: template.url_xpath,
            formula_separator: template.separator,
        }
    }
}

impl HarvestConfig {
    /// Read and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, HarvestError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, HarvestError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| HarvestError::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.keywords_file.as_os_str().is_empty() {
            return Err(HarvestError::Config("keywords_file is required".into()));
        }
        if self.spreadsheet_ids.is_empty() {
            return Err(HarvestError::Config(
                "spreadsheet_ids must list at least one spreadsheet".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(HarvestError::Config("max_attempts must be at least 1".into()));
        }
        if self.results_per_page == 0 {
            return Err(HarvestError::Config(
                "results_per_page must be at least 1".into(),
            ));
        }
        if self.max_polls == Some(0) {
            return Err(HarvestError::Config("max_polls must be at least 1".into()));
        }
        if self.loading_text.is_empty() || self.unavailable_text.is_empty() {
            return Err(HarvestError::Config(
                "loading_text and unavailable_text must not be empty".into(),
            ));
        }
        if self.loading_text == self.unavailable_text {
            return Err(HarvestError::Config(
                "loading_text and unavailable_text must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }

    pub fn query_template(&self) -> QueryTemplate {
        QueryTemplate {
            search_domain: self.search_domain.clone(),
            results_per_page: self.results_per_page,
            start_offset: self.start_offset,
            title_xpath: self.title_xpath.clone(),
            url_xpath: self.url_xpath.clone(),
            separator: self.formula_separator.clone(),
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            submit_delay: Duration::from_millis(self.submit_delay_ms),
            poll_delay: Duration::from_millis(self.poll_delay_ms),
            max_polls: self.max_polls,
            sentinels: Sentinels {
                loading: self.loading_text.clone(),
                unavailable: self.unavailable_text.clone(),
            },
            template: self.query_template(),
        }
    }

    /// Session settings for a run started at `run_date`.
    pub fn session_config(&self, run_date: impl Into<String>) -> SessionConfig {
        SessionConfig {
            request_delay: Duration::from_millis(self.request_delay_ms),
            run_date: run_date.into(),
            poller: self.poller_config(),
        }
    }
}
