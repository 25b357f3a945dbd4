//! Shared fixtures for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::channels::{Arg, Args, Channel, ChannelError, ChannelRegistry, Info, SinkChannel};
use crate::config::{EventSourceConfig, EventTypeConfig, RouteConfig, RouterConfig};
use crate::event::{Event, EventIdentifier, EventIntake};
use crate::routing::Dispatcher;
use crate::templates::TemplateEngine;

/// One `drain` call seen by a [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct Drained {
    pub sink: String,
    pub args: Args,
    pub event_id: Uuid,
    pub content: String,
}

/// Sink that forwards every delivery to a channel, or always fails.
pub struct RecordingSink {
    name: &'static str,
    tx: Option<mpsc::UnboundedSender<Drained>>,
}

impl RecordingSink {
    pub fn new(name: &'static str) -> Self {
        Self { name, tx: None }
    }

    pub fn channel(name: &'static str) -> (Self, mpsc::UnboundedReceiver<Drained>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { name, tx: Some(tx) }, rx)
    }

    pub fn failing(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl Channel for RecordingSink {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "Records deliveries for assertions."
    }
}

#[async_trait]
impl SinkChannel for RecordingSink {
    fn sink_args(&self) -> Vec<Arg> {
        Vec::new()
    }

    fn validate_sink_args(&self, _args: &Args) -> Result<(), ChannelError> {
        Ok(())
    }

    fn sink_info(&self, _args: &Args) -> Vec<Info> {
        Vec::new()
    }

    async fn start_sink(&self, _settings: &Args) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn drain(&self, args: &Args, event: &Event, content: &str) -> Result<(), ChannelError> {
        let tx = self.tx.as_ref().ok_or_else(|| ChannelError::Delivery {
            channel: "recording",
            message: "sink configured to fail".into(),
        })?;
        let _ = tx.send(Drained {
            sink: self.name.to_string(),
            args: args.clone(),
            event_id: event.id,
            content: content.to_string(),
        });
        Ok(())
    }
}

/// Event with the given routing key and object.
pub fn event_for(namespace: &str, source: &str, event_type: &str, object: Value) -> Event {
    Event {
        id: Uuid::new_v4(),
        origin: "test".into(),
        namespace: namespace.into(),
        source: source.into(),
        event_type: event_type.into(),
        parser_name: "json".into(),
        content: "default content".into(),
        raw_content: serde_json::to_vec(&object).unwrap_or_default(),
        object,
    }
}

/// GitHub source with `push` and `pull_request` types, each routed to
/// the `recorder` sink in namespace `acme`.
pub fn sample_config() -> RouterConfig {
    let source = EventSourceConfig {
        name: "GitHub".into(),
        hint: "GitHub-Hookshot".into(),
        parser: "json".into(),
        events: vec![
            EventTypeConfig {
                event_type: "push".into(),
                hint: "X-Github-Event:push".into(),
                template: Some("{{ repository.name }} pushed to {{ ref }}".into()),
            },
            EventTypeConfig {
                event_type: "pull_request".into(),
                hint: "X-Github-Event:pull_request".into(),
                template: None,
            },
        ],
        named_args: None,
        pub_channel_name: None,
        pub_channel_args: Args::new(),
    };

    let route = |event_type: &str| RouteConfig {
        namespace: "acme".into(),
        event_source: "GitHub".into(),
        event_type: event_type.into(),
        sub_channel_name: "recorder".into(),
        ..Default::default()
    };

    RouterConfig {
        sources: vec![source],
        routes: vec![route("push"), route("pull_request")],
        ..Default::default()
    }
}

/// Intake over [`sample_config`] whose routes all drain into one
/// recording sink named `sink_name`.
pub fn recording_intake(sink_name: &'static str) -> (Arc<EventIntake>, mpsc::UnboundedReceiver<Drained>) {
    let mut config = sample_config();
    for route in &mut config.routes {
        route.sub_channel_name = sink_name.to_string();
    }

    let (sink, rx) = RecordingSink::channel(sink_name);
    let mut registry = ChannelRegistry::new();
    registry.register_sink(Arc::new(sink));

    let templates = Arc::new(TemplateEngine::new());
    let dispatcher = Arc::new(Dispatcher::new(
        &config.routes,
        Arc::new(registry),
        Arc::clone(&templates),
    ));
    let intake = EventIntake::new(EventIdentifier::new(config.sources), templates, dispatcher);
    (Arc::new(intake), rx)
}
