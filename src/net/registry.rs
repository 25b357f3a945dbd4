//! Shared connection registry.
//!
//! Stateful sinks (chat sessions, long-lived sockets) must share one
//! session per destination across any number of concurrent senders.
//! The registry maps an opaque destination key to that session.
//!
//! # Locking
//! ```text
//! lookup              → map read lock, never waits on establishment
//! establish_if_absent → per-key gate held across the constructor;
//!                       map locks only for the re-check and the insert
//! remove / remove_if  → map write lock
//! ```
//!
//! Establishment for one key never holds up lookups or establishment for
//! another. The constructor must not establish the same key again,
//! directly or by awaiting a task that does; that would deadlock on the
//! key's gate.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Establishment timeout used when none is configured.
pub const DEFAULT_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(30);

type BoxError = Box<dyn StdError + Send + Sync>;

type Gates = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Errors from establishing a shared connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("timed out after {timeout:?} establishing connection '{key}'")]
    Timeout { key: String, timeout: Duration },

    #[error("failed to establish connection '{key}': {source}")]
    Establish {
        key: String,
        #[source]
        source: BoxError,
    },
}

/// Registry of live shared connections keyed by destination.
#[derive(Debug)]
pub struct ConnectionRegistry<C> {
    connections: RwLock<HashMap<String, Arc<C>>>,
    gates: Gates,
    establish_timeout: Duration,
}

/// A caller's claim on a key's establishment gate. The gate is dropped
/// from the table once its last claimant lets go.
struct GateLease<'a> {
    gates: &'a Gates,
    key: &'a str,
    gate: Arc<Mutex<()>>,
}

impl<'a> GateLease<'a> {
    fn acquire(gates: &'a Gates, key: &'a str) -> Self {
        let gate = gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone();
        Self { gates, key, gate }
    }
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only taken under this lock: two means the table and us
        if Arc::strong_count(&self.gate) == 2 {
            gates.remove(self.key);
        }
    }
}

impl<C> ConnectionRegistry<C> {
    pub fn new(establish_timeout: Duration) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            gates: StdMutex::new(HashMap::new()),
            establish_timeout,
        }
    }

    pub fn establish_timeout(&self) -> Duration {
        self.establish_timeout
    }

    /// Return the registered connection for `key`, if any.
    pub async fn lookup(&self, key: &str) -> Option<Arc<C>> {
        self.connections.read().await.get(key).cloned()
    }

    /// Return the connection for `key`, establishing it with `constructor`
    /// if none is registered.
    ///
    /// Racing callers for the same key serialize on that key's gate;
    /// whoever gets it second finds the first caller's connection. A
    /// failed or timed-out attempt registers nothing, so the next caller
    /// tries again.
    pub async fn establish_if_absent<F, Fut, E>(
        &self,
        key: &str,
        constructor: F,
    ) -> Result<Arc<C>, ConnectionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
        E: Into<BoxError>,
    {
        let lease = GateLease::acquire(&self.gates, key);
        let _held = lease.gate.lock().await;

        // Another caller may have finished while we waited for the gate
        if let Some(existing) = self.lookup(key).await {
            return Ok(existing);
        }

        tracing::debug!(connection_key = key, "Establishing connection");

        let connection = match tokio::time::timeout(self.establish_timeout, constructor()).await {
            Ok(Ok(connection)) => Arc::new(connection),
            Ok(Err(e)) => {
                let source = e.into();
                tracing::debug!(connection_key = key, error = %source, "Connection attempt failed");
                return Err(ConnectionError::Establish {
                    key: key.to_string(),
                    source,
                });
            }
            Err(_) => {
                tracing::debug!(connection_key = key, timeout = ?self.establish_timeout, "Connection attempt timed out");
                return Err(ConnectionError::Timeout {
                    key: key.to_string(),
                    timeout: self.establish_timeout,
                });
            }
        };

        self.connections
            .write()
            .await
            .insert(key.to_string(), Arc::clone(&connection));
        tracing::debug!(connection_key = key, "Connection registered");
        Ok(connection)
    }

    /// Fast path through [`lookup`](Self::lookup), falling back to
    /// [`establish_if_absent`](Self::establish_if_absent).
    pub async fn get_or_establish<F, Fut, E>(
        &self,
        key: &str,
        constructor: F,
    ) -> Result<Arc<C>, ConnectionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
        E: Into<BoxError>,
    {
        if let Some(existing) = self.lookup(key).await {
            return Ok(existing);
        }
        self.establish_if_absent(key, constructor).await
    }

    /// Drop the entry for `key` so the next caller establishes afresh.
    pub async fn remove(&self, key: &str) -> Option<Arc<C>> {
        let removed = self.connections.write().await.remove(key);
        if removed.is_some() {
            tracing::debug!(connection_key = key, "Connection removed");
        }
        removed
    }

    /// Drop the entry for `key` only if `predicate` holds for it.
    ///
    /// Disconnect handlers use this so a late signal from an old session
    /// cannot evict its replacement.
    pub async fn remove_if<P>(&self, key: &str, predicate: P) -> Option<Arc<C>>
    where
        P: FnOnce(&C) -> bool,
    {
        let mut connections = self.connections.write().await;
        match connections.get(key) {
            Some(existing) if predicate(existing) => {
                tracing::debug!(connection_key = key, "Connection removed");
                connections.remove(key)
            }
            _ => None,
        }
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new(DEFAULT_ESTABLISH_TIMEOUT)
    }
}
