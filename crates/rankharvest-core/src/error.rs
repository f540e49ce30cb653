use thiserror::Error;

/// Error types for the keyword ranking harvest.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Writing the query formula to the rendering surface failed.
    #[error("Submit error: {0}")]
    Submit(String),

    /// The rendering surface settled on its "not available" marker.
    #[error("Data unavailable for this query")]
    DataUnavailable,

    /// Reading resolved cell values back from the rendering surface failed.
    #[error("Read error: {0}")]
    Read(String),

    /// The computation was still pending after the configured poll cap.
    #[error("Still pending after {polls} polls")]
    SettleTimeout { polls: u32 },

    /// A single record could not be written to the persistence sink.
    #[error("Write error: {0}")]
    Write(String),

    /// Credentials were rejected by an external service.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    Network(String),

    /// Unexpected HTTP response.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The keyword list could not be read.
    #[error("Keyword source error: {0}")]
    KeywordSource(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HarvestError {
    /// Returns true if this error must abort the process before scraping starts.
    ///
    /// Everything else is handled per keyword (retry queue) or per record
    /// (persistence fan-out).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::KeywordSource(_) | HarvestError::Config(_)
        )
    }

    /// Returns true if the error came from the rendering surface's own
    /// settle protocol rather than from transport.
    pub fn is_settle_failure(&self) -> bool {
        matches!(
            self,
            HarvestError::DataUnavailable | HarvestError::SettleTimeout { .. }
        )
    }
}
