//! Per-route delivery pipeline.
//!
//! # Responsibilities
//! - Look up routes for a classified event
//! - Resolve each route's sink channel
//! - Spawn one pipeline task per resolved route
//!
//! # Pipeline
//! ```text
//! content  = route.template rendered against event.object, else event.content
//! rule     = route.rule rendered, then evaluated as a boolean (false = filtered)
//! args     = each sub_channel_args value rendered independently
//! sink.drain(args, event, content)
//! ```
//!
//! Steps run in order inside one task. A failure aborts only that route.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::channels::{ChannelError, ChannelRegistry, SinkChannel};
use crate::config::RouteConfig;
use crate::event::Event;
use crate::observability::metrics;
use crate::routing::RoutingTable;
use crate::rules::{self, RuleError};
use crate::templates::{TemplateEngine, TemplateError};

/// Why a route pipeline stopped.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("rule '{expression}' failed: {source}")]
    Rule {
        expression: String,
        #[source]
        source: RuleError,
    },

    #[error(transparent)]
    Sink(#[from] ChannelError),
}

/// Successful pipeline outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The route's rule evaluated to false.
    Filtered,
}

/// Fans classified events out to their routes.
pub struct Dispatcher {
    table: RoutingTable,
    sinks: Arc<ChannelRegistry>,
    templates: Arc<TemplateEngine>,
}

impl Dispatcher {
    /// Build the routing table from `routes`. The table is never rebuilt.
    pub fn new(
        routes: &[RouteConfig],
        sinks: Arc<ChannelRegistry>,
        templates: Arc<TemplateEngine>,
    ) -> Self {
        let table = RoutingTable::build(routes);
        tracing::info!(
            routing_keys = table.key_count(),
            routes = table.route_count(),
            "Routing table built"
        );
        Self {
            table,
            sinks,
            templates,
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Spawn a pipeline for every resolved route of `event`.
    ///
    /// Returns the number of pipelines spawned. Must be called from within
    /// a Tokio runtime.
    pub fn dispatch(&self, event: Arc<Event>) -> usize {
        let key = event.routing_key();
        let routes = self.table.lookup(&key);

        if routes.is_empty() {
            tracing::debug!(event_id = %event.id, routing_key = %key, "No routes for event");
            metrics::record_event_unrouted();
            return 0;
        }

        let mut spawned = 0;
        for route in routes {
            let sink_name = route.sub_channel_name.as_str();
            let sink = match self.sinks.sink(sink_name) {
                Ok(sink) => sink,
                Err(e) => {
                    tracing::warn!(event_id = %event.id, sink = %sink_name, error = %e, "Skipping route");
                    metrics::record_delivery(sink_name, "unresolved");
                    continue;
                }
            };

            let event = Arc::clone(&event);
            let route = Arc::clone(route);
            let templates = Arc::clone(&self.templates);

            tokio::spawn(async move {
                let sink_name = route.sub_channel_name.as_str();
                match run_pipeline(&templates, &route, sink.as_ref(), &event).await {
                    Ok(Delivery::Delivered) => {
                        tracing::debug!(event_id = %event.id, sink = %sink_name, "Event delivered");
                        metrics::record_delivery(sink_name, "delivered");
                    }
                    Ok(Delivery::Filtered) => {
                        tracing::debug!(event_id = %event.id, sink = %sink_name, "Event filtered by rule");
                        metrics::record_delivery(sink_name, "filtered");
                    }
                    Err(e) => {
                        tracing::warn!(event_id = %event.id, sink = %sink_name, error = %e, "Route failed");
                        metrics::record_delivery(sink_name, "failed");
                    }
                }
            });
            spawned += 1;
        }

        tracing::debug!(event_id = %event.id, routing_key = %key, routes = spawned, "Event dispatched");
        spawned
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("table", &self.table)
            .field("sinks", &self.sinks)
            .finish_non_exhaustive()
    }
}

/// Run one route's pipeline for `event` against `sink`.
pub async fn run_pipeline(
    templates: &TemplateEngine,
    route: &RouteConfig,
    sink: &dyn SinkChannel,
    event: &Event,
) -> Result<Delivery, RouteError> {
    let object = &event.object;

    // 1. Content
    let content = match route.content_template() {
        Some(template) => templates.render(object, template)?,
        None => event.content.clone(),
    };

    // 2. Rule
    if let Some(rule) = route.rule_template() {
        let expression = templates.render(object, rule)?;
        let passed = rules::evaluate_boolean(&expression)
            .map_err(|source| RouteError::Rule {
                expression: expression.clone(),
                source,
            })?;
        tracing::debug!(event_id = %event.id, expression = %expression, passed, "Rule evaluated");
        if !passed {
            return Ok(Delivery::Filtered);
        }
    }

    // 3. Sink arguments
    let mut args = HashMap::with_capacity(route.sub_channel_args.len());
    for (name, template) in &route.sub_channel_args {
        args.insert(name.clone(), templates.render(object, template)?);
    }

    // 4. Deliver
    sink.drain(&args, event, &content).await?;
    Ok(Delivery::Delivered)
}
