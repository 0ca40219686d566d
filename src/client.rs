//! HTTP client wrapper for instance metadata requests.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};
use tracing::instrument::WithSubscriber;
use tracing::{debug, warn, Dispatch};
use url::Url;

use crate::error::MsiError;

/// Default metadata service base URL (link-local address).
pub const DEFAULT_BASE_URL: &str = "http://169.254.169.254";

/// Required header for metadata requests.
pub(crate) const METADATA_HEADER: &str = "Metadata";

/// Required header value for metadata requests.
pub(crate) const METADATA_VALUE: &str = "true";

/// HTTP client for the instance metadata and managed identity endpoints.
///
/// Cloning is cheap and clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ImdsClient {
    inner: Client,
    base_url: String,
    max_size: Option<usize>,
    dispatch: Option<Dispatch>,
}

impl ImdsClient {
    /// Create a new client with an optional request timeout and the given base URL.
    ///
    /// Passing `None` keeps the reqwest default, which never times out.
    pub fn new(timeout: Option<Duration>, base_url: &str) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::from_reqwest(builder.build()?, base_url))
    }

    /// Create a client for the well-known link-local endpoint without a timeout.
    pub fn with_default_settings() -> Result<Self, reqwest::Error> {
        Self::new(None, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::new(None, base_url)
    }

    /// Wrap an existing reqwest client.
    ///
    /// Deadlines, proxies and pool settings are whatever `client` was built with.
    pub fn from_reqwest(client: Client, base_url: &str) -> Self {
        Self {
            inner: client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_size: None,
            dispatch: None,
        }
    }

    /// Reject response bodies larger than `max_size` bytes.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Route this client's log events to `dispatch` instead of the ambient default.
    pub fn with_dispatch(mut self, dispatch: impl Into<Dispatch>) -> Self {
        self.dispatch = Some(dispatch.into());
        self
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the configured body size limit.
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Run `fut` under the caller-supplied dispatcher, if any.
    pub(crate) async fn traced<F: Future>(&self, fut: F) -> F::Output {
        match &self.dispatch {
            Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
            None => fut.await,
        }
    }

    /// Resolve `path` against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, MsiError> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Send a GET with the metadata header and return the body of a 2xx response.
    pub(crate) async fn get(&self, url: Url) -> Result<Vec<u8>, MsiError> {
        let request = self
            .inner
            .get(url)
            .header(METADATA_HEADER, METADATA_VALUE)
            .build()
            .map_err(|e| MsiError::RequestBuild(Box::new(e)))?;

        debug!(url = %request.url(), "sending metadata request");

        let response = self
            .inner
            .execute(request)
            .await
            .map_err(MsiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = match read_body_limited(response, self.max_size).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    warn!(
                        status = status.as_u16(),
                        error = %err,
                        "failed reading error response body"
                    );
                    format!("<failed to read response body: {err}>")
                }
            };
            warn!(status = status.as_u16(), "metadata service returned non-success status");
            return Err(MsiError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        read_body_limited(response, self.max_size).await
    }
}

/// Read response body with an optional size limit.
///
/// If `max_size` is `Some`, this will:
/// 1. Check the `Content-Length` header and fail early if it exceeds the limit
/// 2. Read the body chunk by chunk, aborting as soon as the limit is exceeded
pub(crate) async fn read_body_limited(
    response: Response,
    max_size: Option<usize>,
) -> Result<Vec<u8>, MsiError> {
    let Some(max_size) = max_size else {
        let bytes = response.bytes().await.map_err(MsiError::Transport)?;
        return Ok(bytes.to_vec());
    };

    if let Some(content_length) = response.content_length() {
        if content_length as usize > max_size {
            return Err(MsiError::TooLarge(content_length as usize, max_size));
        }
    }

    let capacity = response
        .content_length()
        .map(|cl| (cl as usize).min(max_size))
        .unwrap_or(max_size.min(8192));
    let mut body = Vec::with_capacity(capacity);

    let mut stream = response;
    while let Some(chunk) = stream.chunk().await.map_err(MsiError::Transport)? {
        let total = body.len().saturating_add(chunk.len());
        if total > max_size {
            return Err(MsiError::TooLarge(total, max_size));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        assert_eq!(DEFAULT_BASE_URL, "http://169.254.169.254");
    }

    #[test]
    fn test_client_creation() {
        let client = ImdsClient::with_default_settings().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.max_size(), None);
    }

    #[test]
    fn test_client_with_timeout() {
        let client = ImdsClient::new(Some(Duration::from_secs(2)), DEFAULT_BASE_URL).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = ImdsClient::with_base_url("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_max_size() {
        let client = ImdsClient::with_default_settings()
            .unwrap()
            .with_max_size(1024);
        assert_eq!(client.max_size(), Some(1024));
    }

    #[test]
    fn test_endpoint() {
        let client = ImdsClient::with_base_url("http://localhost:8080").unwrap();
        let url = client.endpoint("/metadata/instance").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/metadata/instance");
    }

    #[test]
    fn test_endpoint_invalid_base_url() {
        let client = ImdsClient::with_base_url("not a url").unwrap();
        let result = client.endpoint("/metadata/instance");
        assert!(matches!(result, Err(MsiError::RequestBuild(_))));
    }
}
