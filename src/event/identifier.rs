//! Hint-based event classification.
//!
//! Integrations do not declare a canonical event type, so the source and
//! type are inferred from free-text hints (`Header:value`, `key=value`,
//! chat command words). A configured hint matches when any inbound hint
//! contains it as a case-sensitive substring.
//!
//! Sources are tried in configuration order and the first match wins;
//! types within the matched source are tried the same way.

use thiserror::Error;

use crate::config::{EventSourceConfig, EventTypeConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifyError {
    #[error("could not identify event source from hints {hints:?}")]
    UnknownSource { hints: Vec<String> },

    #[error("could not identify event type of source '{source_name}' from hints {hints:?}")]
    UnknownType {
        source_name: String,
        hints: Vec<String>,
    },
}

/// Matches hints against configured event sources.
#[derive(Debug, Clone, Default)]
pub struct EventIdentifier {
    sources: Vec<EventSourceConfig>,
}

impl EventIdentifier {
    pub fn new(sources: Vec<EventSourceConfig>) -> Self {
        Self { sources }
    }

    /// Resolve the source and type for `hints`.
    pub fn identify<S: AsRef<str>>(
        &self,
        hints: &[S],
    ) -> Result<(&EventSourceConfig, &EventTypeConfig), IdentifyError> {
        let source = self
            .sources
            .iter()
            .find(|s| matches_any(hints, &s.hint))
            .ok_or_else(|| IdentifyError::UnknownSource {
                hints: to_owned(hints),
            })?;

        let event_type = source
            .events
            .iter()
            .find(|t| matches_any(hints, &t.hint))
            .ok_or_else(|| IdentifyError::UnknownType {
                source_name: source.name.clone(),
                hints: to_owned(hints),
            })?;

        tracing::debug!(
            source = %source.name,
            event_type = %event_type.event_type,
            "Event identified"
        );
        Ok((source, event_type))
    }

    pub fn sources(&self) -> &[EventSourceConfig] {
        &self.sources
    }
}

fn matches_any<S: AsRef<str>>(hints: &[S], needle: &str) -> bool {
    hints.iter().any(|h| h.as_ref().contains(needle))
}

fn to_owned<S: AsRef<str>>(hints: &[S]) -> Vec<String> {
    hints.iter().map(|h| h.as_ref().to_string()).collect()
}
