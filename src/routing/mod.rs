//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Table Build (at startup, exactly once):
//!     RouteConfig[]
//!     → Group by RoutingKey(namespace, source, type)
//!     → Keep configuration order within a group
//!     → Freeze as immutable RoutingTable
//!
//! Dispatch (per event):
//!     Event
//!     → table.rs (lookup by routing key; miss = drop)
//!     → resolve sink channel by name (miss = skip route)
//!     → dispatch.rs (one task per route)
//!         content template → rule → sink args → drain
//! ```
//!
//! # Design Decisions
//! - Table built eagerly by `Dispatcher::new`, immutable at runtime
//! - Several routes may share a key (fan-out)
//! - Route failures are logged and counted; they never reach the producer
//! - No completion signal for spawned pipelines

pub mod dispatch;
pub mod table;

pub use dispatch::{run_pipeline, Delivery, Dispatcher, RouteError};
pub use table::RoutingTable;
