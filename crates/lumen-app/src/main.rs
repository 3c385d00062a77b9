#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Binary entrypoint that loads configuration, decides telemetry, and serves
//! the Lumen API until shutdown.

use lumen_app::{AppResult, run_app};

/// Bootstraps the Lumen service and blocks until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
