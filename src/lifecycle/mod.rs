//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Channel registry → Dispatcher (routing table) → Intake
//!         → Start sinks → Spawn sources
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → trigger → every source task observes its signal and returns
//! ```
//!
//! # Design Decisions
//! - Ordered startup: sinks are ready before any source can produce events
//! - In-flight route pipelines are not awaited on shutdown

pub mod shutdown;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{default_channels, Switchyard};
