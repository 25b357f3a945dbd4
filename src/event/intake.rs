//! Core entry point for source channels.
//!
//! # Responsibilities
//! - Classify raw content from its hints
//! - Decode it with the source's parser
//! - Render the default content from the event type template
//! - Build the immutable Event and hand it to the dispatcher
//!
//! Only failures up to this point are reported back to the channel.
//! Everything after dispatch is fire-and-forget.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::event::{Event, EventIdentifier, IdentifyError};
use crate::observability::metrics;
use crate::parsers::{self, ParseError};
use crate::routing::Dispatcher;
use crate::templates::{TemplateEngine, TemplateError};

/// Pre-dispatch failures, surfaced to the producer.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Identify(#[from] IdentifyError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl IntakeError {
    /// Short label used as a metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            IntakeError::Identify(_) => "identify",
            IntakeError::Parse(_) => "parse",
            IntakeError::Template(_) => "template",
        }
    }
}

/// An event that made it to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub event_id: Uuid,
    /// Route pipelines spawned for the event.
    pub routes: usize,
}

pub struct EventIntake {
    identifier: EventIdentifier,
    templates: Arc<TemplateEngine>,
    dispatcher: Arc<Dispatcher>,
}

impl EventIntake {
    pub fn new(
        identifier: EventIdentifier,
        templates: Arc<TemplateEngine>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            identifier,
            templates,
            dispatcher,
        }
    }

    /// Accept raw content from the channel named `origin`.
    ///
    /// Must be called from within a Tokio runtime; route pipelines are
    /// spawned before this returns.
    pub fn ingest<S: AsRef<str>>(
        &self,
        origin: &str,
        namespace: &str,
        raw_content: Vec<u8>,
        hints: &[S],
    ) -> Result<Accepted, IntakeError> {
        let result = self.build_event(origin, namespace, raw_content, hints);
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(origin, namespace, error = %e, "Rejected event");
                metrics::record_event_rejected(e.reason());
                return Err(e);
            }
        };

        tracing::info!(
            event_id = %event.id,
            origin,
            namespace,
            source = %event.source,
            event_type = %event.event_type,
            "Event received"
        );
        metrics::record_event_received(&event.source, &event.event_type);

        let event_id = event.id;
        let routes = self.dispatcher.dispatch(Arc::new(event));
        Ok(Accepted { event_id, routes })
    }

    fn build_event<S: AsRef<str>>(
        &self,
        origin: &str,
        namespace: &str,
        raw_content: Vec<u8>,
        hints: &[S],
    ) -> Result<Event, IntakeError> {
        let (source, event_type) = self.identifier.identify(hints)?;
        let object = parsers::parse(&raw_content, &source.parser)?;

        let content = match event_type.content_template() {
            Some(template) => self.templates.render(&object, template)?,
            None => String::from_utf8_lossy(&raw_content).into_owned(),
        };

        Ok(Event {
            id: Uuid::new_v4(),
            origin: origin.to_string(),
            namespace: namespace.to_string(),
            source: source.name.clone(),
            event_type: event_type.event_type.clone(),
            parser_name: source.parser.clone(),
            content,
            raw_content,
            object,
        })
    }
}

impl std::fmt::Debug for EventIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIntake")
            .field("identifier", &self.identifier)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
