//! HTTP fetcher implementation
//!
//! This module handles the HTTP side of a source fetch, including:
//! - Building the shared HTTP client with the configured user agent
//! - GET requests with per-source headers and a per-attempt timeout
//! - Error classification into retryable and non-retryable failures

use crate::config::SourceDescriptor;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Why a single fetch attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}")]
    ClientResponse { status: u16 },

    #[error("HTTP {status}")]
    ServerResponse { status: u16 },

    #[error("HTTP 429 (rate limited)")]
    RateLimited,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if another attempt may succeed
    ///
    /// | Condition | Retry |
    /// |-----------|-------|
    /// | Connection error | yes |
    /// | Timeout | yes |
    /// | HTTP 5xx | yes |
    /// | HTTP 429 | yes |
    /// | Other HTTP 4xx | no |
    /// | Invalid request / parse / cancelled | no |
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::ServerResponse { .. } | Self::RateLimited
        )
    }

    /// Classifies a non-success HTTP status
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else if status.is_server_error() {
            Self::ServerResponse {
                status: status.as_u16(),
            }
        } else {
            Self::ClientResponse {
                status: status.as_u16(),
            }
        }
    }

    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - Value for the `User-Agent` header
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use feedpulse::fetch::build_http_client;
///
/// let client = build_http_client("feedpulse/1.0").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs one GET attempt for a source
///
/// The timeout covers the whole attempt, body included, and is not shared
/// with later attempts.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `source` - The source to fetch; its headers are added to the request
/// * `timeout` - Deadline for this attempt
///
/// # Returns
///
/// * `Ok(Vec<u8>)` - The complete response body of a 2xx response
/// * `Err(FetchError)` - The classified failure
pub async fn fetch_source(
    client: &Client,
    source: &SourceDescriptor,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let mut request = client.get(&source.url).timeout(timeout);
    for (name, value) in &source.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::from_status(status));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(e, timeout))?;

    tracing::trace!("Received {} bytes from {}", body.len(), source.url);
    Ok(body.to_vec())
}
