//! Switchyard: event routing middleware.
//!
//! Accepts events from pluggable inbound channels, classifies them from
//! free-text hints, optionally transforms and filters them, and fans them
//! out concurrently to outbound channels according to a routing table.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                   SWITCHYARD                      │
//!                        │                                                   │
//!   HTTP POST / IRC msg  │  ┌──────────┐   ┌──────────┐   ┌──────────────┐  │
//!   ─────────────────────┼─▶│ channels │──▶│  event   │──▶│   routing    │  │
//!                        │  │ (source) │   │ intake + │   │ table + task │  │
//!                        │  └──────────┘   │identifier│   │  per route   │  │
//!                        │                 └──────────┘   └──────┬───────┘  │
//!                        │                      │                │          │
//!                        │              parsers/templates   rules (filter) │
//!                        │                                       ▼          │
//!   HTTP POST / IRC msg  │  ┌──────────┐   ┌──────────────────────────────┐ │
//!   ◀────────────────────┼──│   net    │◀──│       channels (sink)        │ │
//!                        │  │ registry │   └──────────────────────────────┘ │
//!                        │  └──────────┘                                    │
//!                        │  config · observability · lifecycle              │
//!                        └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod event;
pub mod routing;
pub mod rules;

// Collaborators
pub mod parsers;
pub mod templates;

// Integrations
pub mod channels;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

#[cfg(test)]
pub(crate) mod testing;

pub use config::schema::RouterConfig;
pub use event::{Event, EventIntake, RoutingKey};
pub use lifecycle::{Shutdown, Switchyard};
pub use routing::Dispatcher;
