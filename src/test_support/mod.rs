//! Test-only helpers shared by unit tests.

pub mod range_server;
pub mod socket_guard;
pub mod truncating_server;
