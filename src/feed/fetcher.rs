use crate::feed::model::SourceFeed;
use crate::feed::parser::{parse_feed, ParseError};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout for upstream feed fetches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default cap on a feed body (10MB).
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

/// Errors that can occur while fetching and parsing one upstream feed.
///
/// Fetches are never retried; every error propagates to the caller as-is.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Upstream answered with a status code >= 400
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    /// The upstream status code, when the failure was an HTTP error status.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus(status) => Some(*status),
            _ => None,
        }
    }
}

/// Limits applied to every upstream request.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_bytes: DEFAULT_MAX_FEED_SIZE,
        }
    }
}

/// Fetches a feed document and parses it into a [`SourceFeed`].
///
/// # Errors
///
/// - [`FetchError::HttpStatus`] - upstream status >= 400
/// - [`FetchError::Timeout`] - headers and body took longer than `limits.timeout`
/// - [`FetchError::Network`] - connection or TLS errors
/// - [`FetchError::ResponseTooLarge`] - body exceeded `limits.max_bytes`
/// - [`FetchError::IncompleteResponse`] - body shorter than Content-Length
/// - [`FetchError::Parse`] - body is not an RSS or Atom document
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    limits: FetchLimits,
) -> Result<SourceFeed, FetchError> {
    // One deadline covers the headers and the whole body.
    let bytes = tokio::time::timeout(limits.timeout, async {
        let response = client.get(url).send().await.map_err(FetchError::Network)?;

        let status = response.status();
        if status.as_u16() >= 400 {
            tracing::warn!(status = status.as_u16(), "Upstream feed returned error status");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, limits.max_bytes).await
    })
    .await
    .map_err(|_| FetchError::Timeout)??;

    let feed = parse_feed(&bytes)?;
    tracing::debug!(
        bytes = bytes.len(),
        entries = feed.entries.len(),
        "Fetched upstream feed"
    );
    Ok(feed)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
