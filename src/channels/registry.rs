//! Named channel lookup and startup.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::channels::{Args, ChannelError, SinkChannel, SourceChannel, SourceStart};
use crate::config::RouterConfig;
use crate::event::EventIntake;
use crate::lifecycle::Shutdown;

/// Source and sink channels keyed by name.
#[derive(Default)]
pub struct ChannelRegistry {
    sources: HashMap<String, Arc<dyn SourceChannel>>,
    sinks: HashMap<String, Arc<dyn SinkChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source(&mut self, channel: Arc<dyn SourceChannel>) {
        self.sources.insert(channel.name().to_string(), channel);
    }

    pub fn register_sink(&mut self, channel: Arc<dyn SinkChannel>) {
        self.sinks.insert(channel.name().to_string(), channel);
    }

    pub fn source(&self, name: &str) -> Result<Arc<dyn SourceChannel>, ChannelError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))
    }

    pub fn sink(&self, name: &str) -> Result<Arc<dyn SinkChannel>, ChannelError> {
        self.sinks
            .get(name)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn sink_names(&self) -> impl Iterator<Item = &str> {
        self.sinks.keys().map(String::as_str)
    }

    /// Start every sink with its channel settings. Failures are logged.
    pub async fn start_sinks(&self, config: &RouterConfig) {
        for (name, sink) in &self.sinks {
            tracing::info!(channel = %name, "Starting sink channel");
            let settings = channel_settings(config, name);
            if let Err(e) = sink.start_sink(&settings).await {
                tracing::warn!(channel = %name, error = %e, "Failed to start sink channel");
            }
        }
    }

    /// Spawn every source on its own task.
    pub fn start_sources(
        &self,
        config: &RouterConfig,
        intake: Arc<EventIntake>,
        shutdown: &Shutdown,
    ) -> Vec<JoinHandle<()>> {
        self.sources
            .iter()
            .map(|(name, source)| {
                let start = SourceStart {
                    settings: channel_settings(config, name),
                    sources: source_args_for(config, name),
                };
                let name = name.clone();
                let source = Arc::clone(source);
                let intake = Arc::clone(&intake);
                let signal = shutdown.subscribe();

                tracing::info!(channel = %name, sources = start.sources.len(), "Starting source channel");
                tokio::spawn(async move {
                    if let Err(e) = source.start_source(start, intake, signal).await {
                        tracing::warn!(channel = %name, error = %e, "Source channel stopped with error");
                    }
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("sinks", &self.sinks.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn channel_settings(config: &RouterConfig, name: &str) -> Args {
    config
        .channels
        .get(name)
        .map(|c| c.config.clone())
        .unwrap_or_default()
}

/// Argument maps of all event sources that publish through `channel`.
pub fn source_args_for(config: &RouterConfig, channel: &str) -> Vec<Args> {
    config
        .sources
        .iter()
        .filter(|s| s.pub_channel_name.as_deref() == Some(channel))
        .map(|s| s.pub_channel_args.clone())
        .collect()
}
