#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Shared test helpers used across the workspace test suites.
//! Layout: fixtures.rs (settings builders), telemetry.rs (recording sinks and record filters).

pub mod fixtures;
pub mod telemetry;
