//! Event model.
//!
//! # Data Flow
//! ```text
//! Source channel (raw bytes, namespace, hints)
//!     → intake.rs (identify, parse, render default content)
//!     → identifier.rs (hint containment against configured sources/types)
//!     → Event (immutable, shared via Arc)
//!     → routing::Dispatcher
//! ```
//!
//! # Design Decisions
//! - Events are never mutated after construction
//! - The parsed object is computed once and shared by every route pipeline
//! - Each event gets a UUID so its log lines can be correlated across tasks

pub mod identifier;
pub mod intake;

use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub use identifier::{EventIdentifier, IdentifyError};
pub use intake::{Accepted, EventIntake, IntakeError};

/// Composite key used to index routes and classify events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    pub namespace: String,
    pub source: String,
    pub event_type: String,
}

impl RoutingKey {
    pub fn new(
        namespace: impl Into<String>,
        source: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            source: source.into(),
            event_type: event_type.into(),
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ns:{}:src:{}:type:{}",
            self.namespace, self.source, self.event_type
        )
    }
}

/// A classified inbound occurrence.
#[derive(Debug, Clone)]
pub struct Event {
    /// Correlation id, assigned at intake.
    pub id: Uuid,

    /// Name of the source channel that received the event.
    pub origin: String,

    pub namespace: String,

    /// Matched event source name.
    pub source: String,

    /// Matched event type name.
    pub event_type: String,

    /// Parser used to decode `raw_content`.
    pub parser_name: String,

    /// Default rendered content.
    pub content: String,

    pub raw_content: Vec<u8>,

    /// Decoded `raw_content`, used as template context.
    pub object: Value,
}

impl Event {
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(&self.namespace, &self.source, &self.event_type)
    }
}
