#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! HTTP surface for the Lumen service.
//!
//! Layout: `http/router.rs` (`ApiServer`, layers, serving), `http/telemetry.rs`
//! (request telemetry middleware), `http/demo.rs` and `http/health.rs`
//! (handlers), `state.rs` (shared state), `error.rs` (`ApiServerError`).

pub mod error;
pub mod http;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
