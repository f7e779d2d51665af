//! Logging initialisation.
//!
//! `STAWBERRY_LOG_LEVEL` (fallback `RUST_LOG`) selects the filter, default `info`.
//! `STAWBERRY_LOG_FORMAT=json` switches to the JSON formatter.

use crate::config::get_env_with_fallback;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("STAWBERRY_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

fn build_filter() -> EnvFilter {
    let directive = get_env_with_fallback("STAWBERRY_LOG_LEVEL", "RUST_LOG")
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Install the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(build_filter());
    match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
    }
}
