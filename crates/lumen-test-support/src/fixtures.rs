//! Settings fixtures.

use std::net::{IpAddr, Ipv4Addr};

use lumen_config::Settings;

/// Application name used by test settings.
pub const TEST_APP_NAME: &str = "lumen-test";
/// Application version used by test settings.
pub const TEST_APP_VERSION: &str = "0.0.1-test";
/// Instrumentation key embedded in [`TEST_CONNECTION_STRING`].
pub const TEST_INSTRUMENTATION_KEY: &str = "ABCDEFGH-1234-5678-9abc-def012345678";
/// Connection descriptor that enables telemetry.
pub const TEST_CONNECTION_STRING: &str = "InstrumentationKey=ABCDEFGH-1234-5678-9abc-def012345678;IngestionEndpoint=https://example.invalid/";

/// Settings bound to loopback with telemetry disabled.
#[must_use]
pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.app.name = TEST_APP_NAME.to_string();
    settings.app.version = TEST_APP_VERSION.to_string();
    settings.server.bind_addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
    settings
}

/// [`settings`] with the given connection descriptor.
#[must_use]
pub fn settings_with_connection_string(descriptor: &str) -> Settings {
    let mut settings = settings();
    settings.azure.connection_string = descriptor.to_string();
    settings
}
