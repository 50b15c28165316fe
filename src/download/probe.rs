//! Capability probe: total size and byte-range support of a resource.
//!
//! The probe never fails. Each fallback it takes is recorded on the
//! diagnostic log, and when nothing answers usefully the result degrades to
//! "size unknown, no ranges", which plans a single worker.

use reqwest::header::ACCEPT_RANGES;
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::client::{HttpClient, content_range_total, header_content_length, is_access_denial};
use super::diagnostics::DiagnosticLog;
use super::filename::filename_from_url;

const FIRST_BYTE: &str = "bytes=0-0";

/// What the probe learned about a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Total size in bytes; 0 when unknown.
    pub total_size: u64,
    /// Whether the server serves `Range` requests with `206`.
    pub supports_ranges: bool,
    /// Sanitized output filename derived from the URL.
    pub filename: String,
    /// True when every probe failed and defaults were used.
    pub degraded: bool,
}

impl ProbeResult {
    fn known(url: &Url, total_size: u64, supports_ranges: bool) -> Self {
        Self {
            total_size,
            supports_ranges,
            filename: filename_from_url(url),
            degraded: false,
        }
    }

    fn degraded(url: &Url) -> Self {
        Self {
            total_size: 0,
            supports_ranges: false,
            filename: filename_from_url(url),
            degraded: true,
        }
    }
}

/// Probes `url` for size and range support.
///
/// Order: `HEAD`; on an access denial a one-byte ranged `GET`; on any other
/// failure a plain `GET` whose body is never read; otherwise degraded.
#[instrument(skip(client, log), fields(url = %url))]
pub async fn probe(client: &HttpClient, url: &Url, log: &DiagnosticLog) -> ProbeResult {
    let raw = url.as_str();

    match client.send_raw(Method::HEAD, raw, None).await {
        Ok(response) if response.status().is_success() => {
            let size = header_content_length(&response).unwrap_or(0);
            let mut supports_ranges = advertises_byte_ranges(&response);
            if !supports_ranges && size > 0 {
                debug!("Accept-Ranges not advertised, testing a one-byte range");
                supports_ranges = matches!(
                    first_byte_probe(client, raw).await,
                    Some(RangedAnswer::Partial { .. })
                );
            }
            debug!(size, supports_ranges, "HEAD probe succeeded");
            return ProbeResult::known(url, size, supports_ranges);
        }
        Ok(response) if is_access_denial(response.status()) => {
            log.warn(format!(
                "HEAD refused with HTTP {}, retrying with a one-byte ranged GET",
                response.status().as_u16()
            ));
            match first_byte_probe(client, raw).await {
                Some(RangedAnswer::Partial { size }) => {
                    log.info(format!("ranged probe succeeded: {size} bytes, ranges supported"));
                    return ProbeResult::known(url, size, true);
                }
                Some(RangedAnswer::Full { size }) => {
                    log.info(format!(
                        "ranged probe answered with the full body: {size} bytes, no ranges"
                    ));
                    return ProbeResult::known(url, size, false);
                }
                None => log.warn("ranged probe failed"),
            }
        }
        Ok(response) => log.warn(format!(
            "HEAD failed with HTTP {}",
            response.status().as_u16()
        )),
        Err(e) => log.warn(format!("HEAD failed: {e}")),
    }

    match plain_get_probe(client, raw).await {
        Some(size) => {
            log.info(format!("plain GET probe succeeded: {size} bytes, no ranges"));
            ProbeResult::known(url, size, false)
        }
        None => {
            log.error("all probes failed, continuing with unknown size and one worker");
            ProbeResult::degraded(url)
        }
    }
}

fn advertises_byte_ranges(response: &Response) -> bool {
    response
        .headers()
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")))
}

enum RangedAnswer {
    Partial { size: u64 },
    Full { size: u64 },
}

/// `GET` with `Range: bytes=0-0`. The body is dropped unread.
async fn first_byte_probe(client: &HttpClient, url: &str) -> Option<RangedAnswer> {
    let response = match client.send_raw(Method::GET, url, Some(FIRST_BYTE)).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "ranged probe transport failure");
            return None;
        }
    };
    match response.status() {
        StatusCode::PARTIAL_CONTENT => {
            let size = content_range_total(&response)
                .or_else(|| header_content_length(&response))
                .unwrap_or(0);
            Some(RangedAnswer::Partial { size })
        }
        StatusCode::OK => Some(RangedAnswer::Full {
            size: header_content_length(&response).unwrap_or(0),
        }),
        status => {
            debug!(status = status.as_u16(), "ranged probe rejected");
            None
        }
    }
}

/// Plain `GET`; only the headers are consulted.
async fn plain_get_probe(client: &HttpClient, url: &str) -> Option<u64> {
    match client.send(Method::GET, url, None).await {
        Ok(response) => Some(
            header_content_length(&response)
                .or_else(|| content_range_total(&response))
                .unwrap_or(0),
        ),
        Err(e) => {
            debug!(error = %e, "plain GET probe failed");
            None
        }
    }
}
