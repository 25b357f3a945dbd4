//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing sources and types)
//! - Reject hints that would match every event
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs after named-arg substitution, before config is accepted

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::parsers;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source #{index} has an empty name")]
    EmptySourceName { index: usize },

    #[error("source '{0}' is declared more than once")]
    DuplicateSource(String),

    #[error("source '{0}' has an empty hint")]
    EmptySourceHint(String),

    #[error("source '{source_name}' uses unknown parser '{parser}'")]
    UnknownParser { source_name: String, parser: String },

    #[error("source '{source_name}' declares event type '{event_type}' more than once")]
    DuplicateEventType { source_name: String, event_type: String },

    #[error("event type '{event_type}' of source '{source_name}' has an empty hint")]
    EmptyTypeHint { source_name: String, event_type: String },

    #[error("route #{index} references unknown source '{source_name}'")]
    UnknownRouteSource { index: usize, source_name: String },

    #[error("route #{index} references unknown event type '{event_type}' of source '{source_name}'")]
    UnknownRouteType { index: usize, source_name: String, event_type: String },

    #[error("route #{index} has no sink channel")]
    MissingSinkChannel { index: usize },

    #[error("named args '{0}' are not declared by any channel")]
    UnknownNamedArgs(String),

    #[error("connections.establish_timeout_secs must be greater than zero")]
    ZeroEstablishTimeout,
}

/// Validate a loaded configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let declared_named: HashSet<&str> = config
        .channels
        .values()
        .flat_map(|c| c.named_args.keys().map(String::as_str))
        .collect();

    let mut seen_sources = HashSet::new();
    for (index, source) in config.sources.iter().enumerate() {
        if source.name.is_empty() {
            errors.push(ValidationError::EmptySourceName { index });
        } else if !seen_sources.insert(source.name.as_str()) {
            errors.push(ValidationError::DuplicateSource(source.name.clone()));
        }

        if source.hint.is_empty() {
            errors.push(ValidationError::EmptySourceHint(source.name.clone()));
        }

        if !parsers::is_known(&source.parser) {
            errors.push(ValidationError::UnknownParser {
                source_name: source.name.clone(),
                parser: source.parser.clone(),
            });
        }

        if let Some(named) = &source.named_args {
            if !declared_named.contains(named.as_str()) {
                errors.push(ValidationError::UnknownNamedArgs(named.clone()));
            }
        }

        let mut seen_types = HashSet::new();
        for event_type in &source.events {
            if !seen_types.insert(event_type.event_type.as_str()) {
                errors.push(ValidationError::DuplicateEventType {
                    source_name: source.name.clone(),
                    event_type: event_type.event_type.clone(),
                });
            }
            if event_type.hint.is_empty() {
                errors.push(ValidationError::EmptyTypeHint {
                    source_name: source.name.clone(),
                    event_type: event_type.event_type.clone(),
                });
            }
        }
    }

    for (index, route) in config.routes.iter().enumerate() {
        match config.sources.iter().find(|s| s.name == route.event_source) {
            None => errors.push(ValidationError::UnknownRouteSource {
                index,
                source_name: route.event_source.clone(),
            }),
            Some(source) => {
                if !source.events.iter().any(|t| t.event_type == route.event_type) {
                    errors.push(ValidationError::UnknownRouteType {
                        index,
                        source_name: route.event_source.clone(),
                        event_type: route.event_type.clone(),
                    });
                }
            }
        }

        if let Some(named) = &route.named_args {
            if !declared_named.contains(named.as_str()) {
                errors.push(ValidationError::UnknownNamedArgs(named.clone()));
            }
        }

        if route.sub_channel_name.is_empty() {
            errors.push(ValidationError::MissingSinkChannel { index });
        }
    }

    if config.connections.establish_timeout_secs == 0 {
        errors.push(ValidationError::ZeroEstablishTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
