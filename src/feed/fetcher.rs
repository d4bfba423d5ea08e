use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Response bodies above this are abandoned mid-stream.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while refreshing a single feed.
///
/// Always scoped to one feed: a batch refresh records these per feed and
/// keeps going.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Database operation failed during reconciliation
    #[error("Database error: {0}")]
    Database(String),
}

/// Download a feed body with a bounded timeout and size cap.
///
/// One clock bounds the whole transfer, headers and body alike: a server
/// that returns headers and then stalls the body must not wedge a refresh
/// cycle. The body is read as a stream and abandoned the moment it crosses
/// the size cap, so a hostile or broken server cannot exhaust memory.
/// Non-2xx statuses are errors; redirects are handled inside the client.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, transfer(client, url))
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn transfer(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await.map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    // Fast path: reject on the declared length before reading anything
    if let Some(len) = response.content_length() {
        if len as usize > MAX_BODY_SIZE {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > MAX_BODY_SIZE {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
