#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! File and environment backed configuration for the Lumen service.
//!
//! Layout: `model.rs` (typed settings and defaults), `loader.rs` (YAML
//! loading, environment overrides, validation), `error.rs` (`ConfigError`).

pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, LoadedSettings, SettingsLoader, SettingsSource, validate,
};
pub use model::{AppSettings, AzureSettings, LoggingSettings, ServerSettings, Settings};
