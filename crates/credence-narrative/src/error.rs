//! Error types for credence-narrative

use thiserror::Error;

/// Errors from the external text-generation endpoint.
///
/// None of these reach scoring callers: `NarrativeService` retries and then
/// falls back to the local template.
#[derive(Error, Debug)]
pub enum NarrativeError {
    /// No endpoint or API key configured
    #[error("Narrative endpoint is not configured")]
    NotConfigured,

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("Narrative endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Attempt exceeded its deadline
    #[error("Narrative request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Endpoint answered without any text
    #[error("Narrative endpoint returned an empty completion")]
    EmptyResponse,

    /// Response body was not the expected JSON
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for NarrativeError {
    fn from(err: reqwest::Error) -> Self {
        NarrativeError::Http(err.to_string())
    }
}
