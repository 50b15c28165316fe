//! Wiremock responder that serves byte ranges of an in-memory body.
//!
//! Shared by unit tests and, through `#[path]`, by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use wiremock::{Request, Respond, ResponseTemplate};

/// Serves `GET` requests from `body`, honouring `Range: bytes=a-b`.
///
/// Requests without a range get the whole body with `200`. Ranges past the
/// end are clipped to the body, as real servers do.
#[derive(Clone)]
pub struct RangeResponder {
    body: Arc<Vec<u8>>,
    failing_starts: Arc<Vec<u64>>,
    failures_remaining: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl RangeResponder {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            failing_starts: Arc::new(Vec::new()),
            failures_remaining: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every ranged request starting at one of `starts` answers `500`.
    pub fn failing_at(mut self, starts: Vec<u64>) -> Self {
        self.failing_starts = Arc::new(starts);
        self
    }

    /// The first `count` ranged requests answer `500`.
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Number of requests answered so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let total = self.body.len() as u64;

        let Some((start, end)) = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range)
        else {
            return ResponseTemplate::new(200)
                .insert_header("accept-ranges", "bytes")
                .set_body_bytes(self.body.as_slice().to_vec());
        };

        if self.failing_starts.contains(&start) {
            return ResponseTemplate::new(500);
        }
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return ResponseTemplate::new(500);
        }
        if start >= total {
            return ResponseTemplate::new(416)
                .insert_header("content-range", format!("bytes */{total}").as_str());
        }

        let end = end.unwrap_or(total - 1).min(total - 1);
        let slice = self.body[start as usize..=end as usize].to_vec();
        ResponseTemplate::new(206)
            .insert_header("accept-ranges", "bytes")
            .insert_header(
                "content-range",
                format!("bytes {start}-{end}/{total}").as_str(),
            )
            .set_body_bytes(slice)
    }
}

pub fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse().ok()?),
    };
    Some((start, end))
}

/// Deterministic, non-repeating-per-range test payload.
pub fn patterned_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// `HEAD` answer advertising `len` bytes, optionally with `Accept-Ranges`.
pub fn head_template(len: usize, accept_ranges: bool) -> ResponseTemplate {
    let template = ResponseTemplate::new(200)
        .insert_header("content-length", len.to_string().as_str())
        .set_body_bytes(vec![0u8; len]);
    if accept_ranges {
        template.insert_header("accept-ranges", "bytes")
    } else {
        template
    }
}
