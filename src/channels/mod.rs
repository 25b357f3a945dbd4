//! Channel subsystem.
//!
//! # Data Flow
//! ```text
//! External system
//!     → SourceChannel (http listener, irc session)
//!     → event::EventIntake::ingest (raw bytes, namespace, hints)
//!
//! routing::Dispatcher
//!     → ChannelRegistry::sink(name)
//!     → SinkChannel::drain(rendered args, event, rendered content)
//!     → External system
//! ```
//!
//! # Design Decisions
//! - One channel type may implement both sides (http, irc)
//! - Channels are registered once at startup and looked up by name
//! - Start failures are logged and do not stop the process

pub mod http;
pub mod irc;
pub mod registry;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::event::{Event, EventIntake};
use crate::lifecycle::ShutdownSignal;
use crate::net::ConnectionError;

pub use registry::ChannelRegistry;

/// String arguments passed to a channel.
pub type Args = HashMap<String, String>;

/// Errors raised by channels.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("missing required argument '{0}'")]
    MissingArg(String),

    #[error("invalid argument '{arg}': {message}")]
    InvalidArg { arg: String, message: String },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("{channel} delivery failed: {message}")]
    Delivery {
        channel: &'static str,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Irc(#[from] irc::IrcError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An argument a channel accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: &'static str,
    pub description: &'static str,
    pub default: Option<&'static str>,
    pub required: bool,
}

/// A piece of information an external system needs to use a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    pub description: String,
    pub value: String,
}

/// What a source channel is started with.
#[derive(Debug, Clone, Default)]
pub struct SourceStart {
    /// `channels.<name>.config` from the configuration.
    pub settings: Args,

    /// Argument maps of every event source that publishes through this channel.
    pub sources: Vec<Args>,
}

pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;
}

/// Inbound integration.
#[async_trait]
pub trait SourceChannel: Channel {
    fn source_args(&self) -> Vec<Arg>;

    fn validate_source_args(&self, args: &Args) -> Result<(), ChannelError>;

    fn source_info(&self, args: &Args) -> Vec<Info>;

    /// Run the source until `shutdown` fires, handing events to `intake`.
    async fn start_source(
        &self,
        start: SourceStart,
        intake: Arc<EventIntake>,
        shutdown: ShutdownSignal,
    ) -> Result<(), ChannelError>;
}

/// Outbound integration.
#[async_trait]
pub trait SinkChannel: Channel {
    fn sink_args(&self) -> Vec<Arg>;

    fn validate_sink_args(&self, args: &Args) -> Result<(), ChannelError>;

    fn sink_info(&self, args: &Args) -> Vec<Info>;

    async fn start_sink(&self, settings: &Args) -> Result<(), ChannelError>;

    /// Deliver one event.
    async fn drain(&self, args: &Args, event: &Event, content: &str) -> Result<(), ChannelError>;
}

/// Fill in defaults from `defs` and reject missing required arguments.
///
/// Empty values count as missing.
pub fn resolve_args(defs: &[Arg], args: &Args) -> Result<Args, ChannelError> {
    let mut resolved = args.clone();
    for def in defs {
        let present = resolved.get(def.name).is_some_and(|v| !v.is_empty());
        if present {
            continue;
        }
        match def.default {
            Some(default) => {
                resolved.insert(def.name.to_string(), default.to_string());
            }
            None if def.required => return Err(ChannelError::MissingArg(def.name.to_string())),
            None => {}
        }
    }
    Ok(resolved)
}
