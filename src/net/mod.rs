//! Connection plumbing shared by stateful channels.
//!
//! # Data Flow
//! ```text
//! Sink drain for destination key
//!     → registry.rs (lookup under read lock)
//!     → miss: establish_if_absent (per-key gate, re-check, timed constructor)
//!     → connection.rs (session id + live session gauge)
//!
//! Session lost:
//!     reader task → remove_if(key, id matches) on a separate task
//!     source loop → backoff.rs delay → establish again
//! ```
//!
//! # Design Decisions
//! - One session per destination key, no matter how many concurrent senders
//! - Failed or timed-out establishment never leaves a registry entry
//! - Removal is matched by session id so a stale disconnect cannot evict a fresh session

pub mod backoff;
pub mod connection;
pub mod registry;

pub use backoff::Backoff;
pub use connection::{ConnectionId, SessionGuard, SessionTracker};
pub use registry::{ConnectionError, ConnectionRegistry, DEFAULT_ESTABLISH_TIMEOUT};
