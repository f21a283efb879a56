//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Translate the Mythic `DEBUG_LEVEL` vocabulary into filter directives
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Access records always pass at `info`, independent of the crate level
//! - An unknown level falls back to `info`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map a configured level name onto a tracing level.
///
/// Accepts the names Mythic containers pass in `DEBUG_LEVEL`, including
/// `warning`, `critical` and `fatal`.
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => "info",
    }
}

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(level: &str) -> String {
    format!(
        "mythic_http={},access_log=info,tower_http=warn",
        normalize_level(level)
    )
}

/// Install the global subscriber.
pub fn init_tracing(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(level).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mythic_level_names_are_understood() {
        assert_eq!(normalize_level("warning"), "warn");
        assert_eq!(normalize_level("DEBUG"), "debug");
        assert_eq!(normalize_level("critical"), "error");
        assert_eq!(normalize_level(" info "), "info");
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(normalize_level("verbose"), "info");
        assert_eq!(normalize_level(""), "info");
    }

    #[test]
    fn access_log_target_stays_enabled() {
        let directives = default_directives("error");
        assert!(directives.starts_with("mythic_http=error"));
        assert!(directives.contains("access_log=info"));
        assert!(directives.parse::<EnvFilter>().is_ok());
    }
}
