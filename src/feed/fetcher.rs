use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::parser::{parse_document, RawFeedDocument};

/// Fixed identifying User-Agent sent with every feed request.
const USER_AGENT: &str = "feedrake";

/// Hard cap on feed body size to bound memory per fetch.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors from fetching and parsing one feed document.
///
/// All of these are fatal to the current aggregation cycle; the fetcher
/// never retries on its own.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection, TLS).
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// The response body could not be read.
    #[error("could not read feed body: {0}")]
    Http(#[source] reqwest::Error),

    /// The body is not well-formed RSS XML.
    #[error("invalid RSS XML: {0}")]
    Parse(#[from] quick_xml::DeError),

    /// Response body exceeded [`MAX_FEED_SIZE`].
    #[error("feed body too large")]
    ResponseTooLarge,

    /// The execution context was cancelled while the request was in flight.
    #[error("fetch cancelled")]
    Cancelled,
}

/// Fetch one feed URL and parse it into a [`RawFeedDocument`].
///
/// Issues a single GET with the fixed `feedrake` User-Agent, reads the
/// full body (size-capped), parses it as RSS 2.0 and unescapes HTML
/// entities in all textual fields. Cancelling `cancel` aborts the
/// outstanding request and yields [`FetchError::Cancelled`].
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    cancel: &CancellationToken,
) -> Result<RawFeedDocument, FetchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        result = fetch_inner(client, url) => result,
    }
}

async fn fetch_inner(
    client: &reqwest::Client,
    url: &str,
) -> Result<RawFeedDocument, FetchError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .map_err(FetchError::Network)?;

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    Ok(parse_document(&bytes)?)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: trust Content-Length when present
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Http)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
