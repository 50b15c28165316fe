//! Helpers shared by the integration tests.
//!
//! The socket guard and the range-serving responder live under
//! `src/test_support` so unit tests can use them too.

#![allow(dead_code)]

#[path = "../../src/test_support/range_server.rs"]
pub mod range_server;
#[path = "../../src/test_support/socket_guard.rs"]
pub mod socket_guard;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

use range_server::{RangeResponder, head_template};

/// Mounts `HEAD` (advertising `advertised_len` and byte ranges) and `GET`
/// answered by `responder` for `route`.
pub async fn mount_ranged_resource(
    server: &MockServer,
    route: &str,
    responder: RangeResponder,
    advertised_len: usize,
) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(head_template(advertised_len, true))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(responder)
        .mount(server)
        .await;
}
