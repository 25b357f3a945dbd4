//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (event, delivery and connection counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every event carries its UUID in log fields from intake to sink
//! - Metric updates are no-ops until a recorder is installed
//! - Prometheus exporter only starts when enabled in config

pub mod logging;
pub mod metrics;
