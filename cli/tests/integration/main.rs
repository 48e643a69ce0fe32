//! Integration tests for the Chain Core installer
//!
//! Router tests drive the axum app in-process; adapter tests talk to a local
//! mock of the provider API; CLI tests spawn the actual binary.

#[path = "../unit/fakes.rs"]
mod fakes;

mod provider_http;
mod server_routes;
