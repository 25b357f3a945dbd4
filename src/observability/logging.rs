//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Resolve the log filter from `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> String {
    format!("switchyard={level},tower_http={level}")
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(level: &str, json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("debug"), "switchyard=debug,tower_http=debug");
    }
}
