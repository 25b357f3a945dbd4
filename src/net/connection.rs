//! Session identity and lifetime tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs so a disconnect can be matched to the
//!   exact session that was registered
//! - Track the number of live sessions per channel for metrics

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of one established session.
///
/// Two sessions to the same destination never share an id, so a late
/// disconnect can tell whether the registry still holds its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Counts live sessions for one channel.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    channel: &'static str,
    active: Arc<AtomicU64>,
}

impl SessionTracker {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            active: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a new live session. The returned guard decrements on drop.
    pub fn track(&self) -> SessionGuard {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(self.channel, active);
        SessionGuard {
            channel: self.channel,
            active: Arc::clone(&self.active),
            id: ConnectionId::next(),
        }
    }

    /// Current number of live sessions.
    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

/// Guard owned by a live session.
#[derive(Debug)]
pub struct SessionGuard {
    channel: &'static str,
    active: Arc<AtomicU64>,
    id: ConnectionId,
}

impl SessionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_connections(self.channel, active);
        tracing::trace!(connection_id = %self.id, channel = self.channel, "Session released");
    }
}
