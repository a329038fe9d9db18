// crates/airlift-loader/src/fetch.rs
// ============================================================================
// Module: Airlift HTTP Fetch
// Description: Bounded blocking HTTP used for manifests and assets.
// Purpose: Download byte bodies with strict size and time limits.
// Dependencies: reqwest
// ============================================================================

//! ## Overview
//! One small surface over `reqwest`'s blocking client: build a client with
//! a timeout and user agent, issue a GET with extra headers, and read the
//! body with a hard byte cap. Responses over the cap, non-success status
//! codes, and unparsable header names all fail closed; the caller decides
//! whether that is a per-asset failure or a whole-load failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum redirects followed for manifest and asset requests.
const MAX_REDIRECTS: usize = 10;
/// Read chunk size for bounded body reads.
const READ_CHUNK_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced by bounded HTTP fetches.
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    /// Client construction failed.
    #[error("http client build failed: {0}")]
    Client(String),
    /// Request header name or value was not valid.
    #[error("invalid request header: {0}")]
    Header(String),
    /// Transport-level failure (DNS, connect, timeout, read).
    #[error("http transport failure: {0}")]
    Transport(String),
    /// Server answered with a non-success status.
    #[error("http status {0}")]
    Status(u16),
    /// Body exceeded the configured byte cap.
    #[error("response exceeds size limit of {max_bytes} bytes")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
    },
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Builds a blocking HTTP client with the engine's limits applied.
///
/// # Errors
///
/// Returns [`FetchError::Client`] when the client cannot be constructed.
pub fn build_http_client(user_agent: &str, timeout_ms: u64) -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_millis(timeout_ms))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|err| FetchError::Client(err.to_string()))
}

// ============================================================================
// SECTION: Fetch
// ============================================================================

/// Issues a GET for `url` with `headers` and returns the body, capped at
/// `max_bytes`.
///
/// # Errors
///
/// Returns [`FetchError`] on transport failures, non-success status codes,
/// invalid headers, or oversized bodies.
pub fn fetch_bytes(
    client: &Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    max_bytes: usize,
) -> Result<Vec<u8>, FetchError> {
    let header_map = build_header_map(headers)?;
    let response = client
        .get(url)
        .headers(header_map)
        .send()
        .map_err(|err| FetchError::Transport(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    read_response_limited(response, max_bytes)
}

/// Converts string header pairs into a typed header map.
fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::Header(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| FetchError::Header(value.clone()))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Reads a response body with a hard byte cap.
fn read_response_limited(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    let mut chunk = vec![0_u8; READ_CHUNK_BYTES];
    loop {
        let read = response
            .read(&mut chunk)
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        if read == 0 {
            return Ok(body);
        }
        if body.len() + read > max_bytes {
            return Err(FetchError::TooLarge {
                max_bytes,
            });
        }
        body.extend_from_slice(&chunk[.. read]);
    }
}
