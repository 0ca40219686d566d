//! Error types for metadata and token requests.

use thiserror::Error;

/// Boxed cause of a request that could not be constructed.
pub type BuildError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when calling the instance metadata service.
#[derive(Debug, Error)]
pub enum MsiError {
    /// The request URL or request object could not be built.
    #[error("failed to build request: {0}")]
    RequestBuild(#[source] BuildError),

    /// The request could not be sent, or the response body could not be read.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response body was not the expected JSON document.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service answered with a status outside 200-299.
    #[error("metadata service returned status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, or a note if it could not be read.
        body: String,
    },

    /// Response exceeds maximum allowed size.
    #[error("response too large: {0} bytes exceeds limit of {1} bytes")]
    TooLarge(usize, usize),
}

impl MsiError {
    /// HTTP status code, if the service answered with a non-success status.
    pub fn status(&self) -> Option<u16> {
        match self {
            MsiError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<url::ParseError> for MsiError {
    fn from(err: url::ParseError) -> Self {
        MsiError::RequestBuild(Box::new(err))
    }
}
