//! Configuration file structure.
//!
//! Sources and routes keep their file order: identification and dispatch
//! both depend on it. Every section may be omitted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for the event router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shared connection settings for stateful sinks.
    pub connections: ConnectionConfig,

    /// Per-channel settings, keyed by channel name.
    pub channels: HashMap<String, ChannelConfig>,

    /// Event sources, in matching order.
    pub sources: Vec<EventSourceConfig>,

    /// Routes, in dispatch order.
    pub routes: Vec<RouteConfig>,
}

/// Settings handed to a channel when it starts.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ChannelConfig {
    /// Free-form channel settings (bind address, timeouts, ...).
    pub config: HashMap<String, String>,

    /// Reusable argument sets, referenced by name from sources and routes.
    pub named_args: HashMap<String, HashMap<String, String>>,
}

/// An inbound event source and the event types it can produce.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventSourceConfig {
    /// Source name, e.g. "GitHub".
    pub name: String,

    /// Substring that must appear in one of the inbound hints.
    pub hint: String,

    /// Parser used to decode raw content ("json", "toml").
    pub parser: String,

    /// Event types, in matching order.
    #[serde(default)]
    pub events: Vec<EventTypeConfig>,

    /// Named argument set supplying `pub_channel_name`/`pub_channel_args`.
    #[serde(default)]
    pub named_args: Option<String>,

    /// Source channel that should listen for this source.
    #[serde(default)]
    pub pub_channel_name: Option<String>,

    /// Arguments for the source channel.
    #[serde(default)]
    pub pub_channel_args: HashMap<String, String>,
}

/// A type of event within a source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventTypeConfig {
    /// Type name, e.g. "push".
    #[serde(rename = "type")]
    pub event_type: String,

    /// Substring that must appear in one of the inbound hints.
    pub hint: String,

    /// Template producing the default event content.
    #[serde(default)]
    pub template: Option<String>,
}

/// A route from a classified event to a sink channel.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouteConfig {
    pub namespace: String,

    pub event_source: String,

    pub event_type: String,

    /// Content template overriding the event's default content.
    pub template: Option<String>,

    /// Template yielding a boolean rule expression.
    pub rule: Option<String>,

    /// Sink channel to deliver to.
    pub sub_channel_name: String,

    /// Sink arguments; each value is a template.
    pub sub_channel_args: HashMap<String, String>,

    /// Named argument set supplying `sub_channel_name`/`sub_channel_args`.
    pub named_args: Option<String>,
}

impl RouteConfig {
    /// Content template, ignoring empty strings.
    pub fn content_template(&self) -> Option<&str> {
        non_empty(&self.template)
    }

    /// Rule template, ignoring empty strings.
    pub fn rule_template(&self) -> Option<&str> {
        non_empty(&self.rule)
    }
}

impl EventTypeConfig {
    /// Default content template, ignoring empty strings.
    pub fn content_template(&self) -> Option<&str> {
        non_empty(&self.template)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|t| !t.trim().is_empty())
}

/// Shared connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Maximum time to wait for a session to become ready, in seconds.
    pub establish_timeout_secs: u64,

    /// Base delay before a source re-establishes a dropped session.
    pub reconnect_base_delay_ms: u64,

    /// Cap on the reconnect delay.
    pub reconnect_max_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            establish_timeout_secs: 30,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
