//! Shared HTTP client for probes and ranged transfers.
//!
//! One [`HttpClient`] is created per download and cloned into every worker;
//! the underlying `reqwest::Client` pools connections and is safe to use from
//! many tasks at once.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, trace};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent::{BROWSER_USER_AGENT, browser_headers};

/// Cloneable handle to a pooled HTTP client with browser-like headers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with default connect/read timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a client with explicit timeouts.
    ///
    /// Timeouts apply per network call: `connect_timeout` to establishing a
    /// connection and `read_timeout` to each read of the body, never to a
    /// whole transfer.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the client cannot be built.
    pub fn with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(browser_headers())
            .cookie_store(true)
            .build()
            .map_err(|e| DownloadError::network("<client builder>", e))?;
        Ok(Self { client })
    }

    /// Sends `method url`, optionally with a `Range` header, and returns the
    /// response without inspecting its status.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Timeout`] or [`DownloadError::Network`] when
    /// no response arrives.
    pub async fn send_raw(
        &self,
        method: Method,
        url: &str,
        range: Option<&str>,
    ) -> Result<Response, DownloadError> {
        let mut request = self.client.request(method, url);
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }
        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        trace!(status = response.status().as_u16(), ?range, "response received");
        Ok(response)
    }

    /// Sends a request and maps non-success statuses to errors.
    ///
    /// `401`/`403`/`405` become [`DownloadError::AccessBlocked`]; other non-2xx
    /// statuses become [`DownloadError::HttpStatus`].
    ///
    /// # Errors
    ///
    /// See above, plus the transport errors of [`send_raw`](Self::send_raw).
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        range: Option<&str>,
    ) -> Result<Response, DownloadError> {
        let response = self.send_raw(method, url, range).await?;
        check_status(url, &response)?;
        Ok(response)
    }

    /// Issues a ranged `GET` for the inclusive interval `start..=end`.
    ///
    /// A `200` answer means the server ignored the range, which would corrupt
    /// a part file; it is reported as [`DownloadError::RangeIgnored`].
    ///
    /// # Errors
    ///
    /// Returns the errors of [`send`](Self::send) and `RangeIgnored`.
    pub async fn get_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
    ) -> Result<Response, DownloadError> {
        let range = format!("bytes={start}-{end}");
        let response = self.send(Method::GET, url, Some(&range)).await?;
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::range_ignored(
                url,
                range,
                response.status().as_u16(),
            ));
        }
        debug!(%range, "range accepted");
        Ok(response)
    }
}

fn check_status(url: &str, response: &Response) -> Result<(), DownloadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if is_access_denial(status) {
        return Err(DownloadError::access_blocked(url, status.as_u16()));
    }
    Err(DownloadError::http_status(url, status.as_u16()))
}

/// Statuses servers use to refuse a request outright.
pub(crate) fn is_access_denial(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::METHOD_NOT_ALLOWED
    )
}

/// Reads the `Content-Length` header directly.
///
/// `Response::content_length` reports the body size hint, which is zero for
/// `HEAD` responses; the header is what the probe needs.
pub(crate) fn header_content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Total resource size from a `Content-Range: bytes a-b/total` header.
pub(crate) fn content_range_total(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range_total)
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    let total = total.trim();
    if total == "*" {
        return None;
    }
    total.parse::<u64>().ok()
}
