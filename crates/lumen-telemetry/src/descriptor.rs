//! Connection descriptor parsing.
//!
//! A connection descriptor is a `;` separated list of `Key=Value` pairs such as
//! `InstrumentationKey=...;IngestionEndpoint=...`. Only the instrumentation key
//! is consumed here; every other pair is ignored.

/// Segment prefix that carries the instrumentation key.
const INSTRUMENTATION_KEY_PREFIX: &str = "InstrumentationKey=";

/// Number of leading key characters that may appear in logs.
const REDACTED_PREFIX_CHARS: usize = 8;

/// Extract the instrumentation key from a connection descriptor.
///
/// The first segment starting with `InstrumentationKey=` wins and its remainder
/// is returned verbatim. Returns an empty string when no segment matches.
#[must_use]
pub fn extract_instrumentation_key(descriptor: &str) -> String {
    descriptor
        .split(';')
        .find_map(|segment| segment.strip_prefix(INSTRUMENTATION_KEY_PREFIX))
        .unwrap_or_default()
        .to_string()
}

/// Render a key safe for logs and diagnostics: the first eight characters
/// followed by an ellipsis marker.
#[must_use]
pub fn redact_key(key: &str) -> String {
    let prefix: String = key.chars().take(REDACTED_PREFIX_CHARS).collect();
    format!("{prefix}...")
}
