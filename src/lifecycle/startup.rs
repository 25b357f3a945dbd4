//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the channel registry from configuration
//! - Build the dispatcher (and its routing table) exactly once
//! - Start sinks, then spawn sources
//!
//! # Design Decisions
//! - Fail fast on construction errors; channel start failures are logged only
//! - Sources start last so no event arrives before its sinks are ready

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::channels::http::HttpChannel;
use crate::channels::irc::IrcChannel;
use crate::channels::{ChannelError, ChannelRegistry};
use crate::config::RouterConfig;
use crate::event::{EventIdentifier, EventIntake};
use crate::lifecycle::Shutdown;
use crate::routing::Dispatcher;
use crate::templates::TemplateEngine;

/// Built-in channels: `http` and `irc`, each as both source and sink.
pub fn default_channels(config: &RouterConfig) -> Result<ChannelRegistry, ChannelError> {
    let mut registry = ChannelRegistry::new();

    let http = Arc::new(HttpChannel::new()?);
    registry.register_source(http.clone());
    registry.register_sink(http);

    let irc = Arc::new(IrcChannel::new(&config.connections));
    registry.register_source(irc.clone());
    registry.register_sink(irc);

    Ok(registry)
}

/// The assembled router.
pub struct Switchyard {
    config: RouterConfig,
    channels: Arc<ChannelRegistry>,
    dispatcher: Arc<Dispatcher>,
    intake: Arc<EventIntake>,
}

impl Switchyard {
    pub fn new(config: RouterConfig, channels: ChannelRegistry) -> Self {
        let channels = Arc::new(channels);
        warn_unknown_channels(&config, &channels);

        let templates = Arc::new(TemplateEngine::new());
        let dispatcher = Arc::new(Dispatcher::new(
            &config.routes,
            Arc::clone(&channels),
            Arc::clone(&templates),
        ));
        let intake = Arc::new(EventIntake::new(
            EventIdentifier::new(config.sources.clone()),
            templates,
            Arc::clone(&dispatcher),
        ));

        Self {
            config,
            channels,
            dispatcher,
            intake,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn intake(&self) -> Arc<EventIntake> {
        Arc::clone(&self.intake)
    }

    /// Start sinks, then spawn sources. Returns the source tasks.
    pub async fn start(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        self.channels.start_sinks(&self.config).await;
        let tasks = self.channels.start_sources(&self.config, self.intake(), shutdown);
        tracing::info!(sources = tasks.len(), "Switchyard started");
        tasks
    }
}

fn warn_unknown_channels(config: &RouterConfig, channels: &ChannelRegistry) {
    for (index, route) in config.routes.iter().enumerate() {
        if channels.sink(&route.sub_channel_name).is_err() {
            tracing::warn!(route = index, sink = %route.sub_channel_name, "Route targets an unknown sink channel");
        }
    }
    for source in &config.sources {
        if let Some(name) = &source.pub_channel_name {
            if channels.source(name).is_err() {
                tracing::warn!(source = %source.name, channel = %name, "Event source names an unknown source channel");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_config, RecordingSink};
    use std::time::Duration;

    #[test]
    fn test_default_channels() {
        let registry = default_channels(&RouterConfig::default()).unwrap();
        let mut sinks: Vec<&str> = registry.sink_names().collect();
        sinks.sort();
        assert_eq!(sinks, vec!["http", "irc"]);
        assert!(registry.source("http").is_ok());
        assert!(registry.source("irc").is_ok());
    }

    #[tokio::test]
    async fn test_start_and_ingest() {
        let (sink, mut rx) = RecordingSink::channel("recorder");
        let mut channels = ChannelRegistry::new();
        channels.register_sink(Arc::new(sink));

        let app = Switchyard::new(sample_config(), channels);
        assert_eq!(app.dispatcher().table().route_count(), 2);

        let shutdown = Shutdown::new();
        let tasks = app.start(&shutdown).await;
        assert!(tasks.is_empty());

        let hints = ["User-Agent:GitHub-Hookshot/1", "X-Github-Event:pull_request"];
        app.intake().ingest("test", "acme", br#"{"number": 1}"#.to_vec(), &hints).unwrap();

        let drained = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(drained.content, r#"{"number": 1}"#);
    }
}
