//! Route index.
//!
//! # Responsibilities
//! - Group configured routes by routing key
//! - Look up every route for a classified event
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookup via HashMap
//! - Missing key yields an empty slice rather than an error

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RouteConfig;
use crate::event::RoutingKey;

/// Routes grouped by routing key, in configuration order.
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<RoutingKey, Vec<Arc<RouteConfig>>>,
    route_count: usize,
}

impl RoutingTable {
    /// Index `routes` by routing key.
    pub fn build(routes: &[RouteConfig]) -> Self {
        let mut grouped: HashMap<RoutingKey, Vec<Arc<RouteConfig>>> = HashMap::new();
        for route in routes {
            let key = RoutingKey::new(&route.namespace, &route.event_source, &route.event_type);
            grouped.entry(key).or_default().push(Arc::new(route.clone()));
        }

        for (key, group) in &grouped {
            tracing::debug!(routing_key = %key, routes = group.len(), "Routes indexed");
        }

        Self {
            routes: grouped,
            route_count: routes.len(),
        }
    }

    /// All routes for `key`; empty when none are configured.
    pub fn lookup(&self, key: &RoutingKey) -> &[Arc<RouteConfig>] {
        self.routes.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct routing keys.
    pub fn key_count(&self) -> usize {
        self.routes.len()
    }

    /// Number of routes across all keys.
    pub fn route_count(&self) -> usize {
        self.route_count
    }
}
