//! IRC channel.
//!
//! # Data Flow
//! ```text
//! Sink drain(args)
//!     → IrcTarget (server, channel, nickname)
//!     → ConnectionRegistry (one session per server:channel:nickname)
//!     → PRIVMSG per content line
//!
//! Source (per configured arg set)
//!     → shared session → subscribe to channel messages
//!     → {from, msg, args} JSON, first word as hint
//!     → EventIntake::ingest, errors replied to the channel
//!     → on disconnect: backoff, then establish again
//! ```
//!
//! # Design Decisions
//! - Sink and source share sessions for the same destination
//! - A dropped session removes its own registry entry from a separate
//!   task, matched by session id, never from inside establishment
//! - Reconnection only happens in the source loop, outside the registry lock

mod client;
mod sink;
mod source;

use std::sync::Arc;
use std::time::Duration;

use crate::channels::{resolve_args, Arg, Args, Channel, ChannelError};
use crate::config::ConnectionConfig;
use crate::net::{ConnectionError, ConnectionRegistry, SessionTracker};
use crate::observability::metrics;

pub use client::{ChatMessage, IrcError, IrcSession, IrcTarget, Line, OnClose, DEFAULT_PORT};
pub use source::{command_document, strip_mention};

pub const SERVER_ARG: &str = "server";
pub const PASSWORD_ARG: &str = "password";
pub const CHANNEL_ARG: &str = "channel";
pub const NICKNAME_ARG: &str = "nickname";
pub const NAMESPACE_ARG: &str = "namespace";

const CHANNEL_NAME: &str = "irc";

/// Sends events to IRC rooms and turns room commands into events.
#[derive(Debug, Clone)]
pub struct IrcChannel {
    sessions: Arc<ConnectionRegistry<IrcSession>>,
    tracker: SessionTracker,
    reconnect_base_ms: u64,
    reconnect_max_ms: u64,
}

impl IrcChannel {
    pub fn new(connections: &ConnectionConfig) -> Self {
        Self {
            sessions: Arc::new(ConnectionRegistry::new(Duration::from_secs(
                connections.establish_timeout_secs,
            ))),
            tracker: SessionTracker::new(CHANNEL_NAME),
            reconnect_base_ms: connections.reconnect_base_delay_ms,
            reconnect_max_ms: connections.reconnect_max_delay_ms,
        }
    }

    /// Same as `new`, with an explicit establishment timeout.
    pub fn with_establish_timeout(connections: &ConnectionConfig, timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(ConnectionRegistry::new(timeout)),
            ..Self::new(connections)
        }
    }

    /// Registry of live sessions.
    pub fn sessions(&self) -> &Arc<ConnectionRegistry<IrcSession>> {
        &self.sessions
    }

    /// Number of sessions currently connected or handshaking.
    pub fn active_sessions(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Shared session for `target`, establishing it if needed.
    pub async fn session(&self, target: &IrcTarget) -> Result<Arc<IrcSession>, ChannelError> {
        let key = target.key();

        if let Some(existing) = self.sessions.lookup(&key).await {
            if !existing.is_closed() {
                return Ok(existing);
            }
            // Dropped but its cleanup task has not run yet
            let stale = existing.id();
            self.sessions.remove_if(&key, |s| s.id() == stale).await;
        }

        let on_close = self.removal_handler(key.clone());
        let tracker = self.tracker.clone();
        let connect_target = target.clone();

        let result = self
            .sessions
            .establish_if_absent(&key, move || async move {
                let session = IrcSession::connect(connect_target, &tracker, on_close).await?;
                metrics::record_connection_established(CHANNEL_NAME);
                Ok::<_, IrcError>(session)
            })
            .await;

        result.map_err(|e| {
            let reason = match &e {
                ConnectionError::Timeout { .. } => "timeout",
                ConnectionError::Establish { .. } => "handshake",
            };
            tracing::warn!(connection_key = %key, error = %e, "IRC session could not be established");
            metrics::record_connection_failure(CHANNEL_NAME, reason);
            ChannelError::Connection(e)
        })
    }

    /// Disconnect callback: drops the registry entry on its own task, and
    /// only if the entry is still the session that disconnected.
    fn removal_handler(&self, key: String) -> OnClose {
        let registry = Arc::downgrade(&self.sessions);
        Box::new(move |id| {
            tokio::spawn(async move {
                let Some(registry) = registry.upgrade() else {
                    return;
                };
                if registry.remove_if(&key, |s| s.id() == id).await.is_some() {
                    tracing::debug!(connection_key = %key, connection_id = %id, "Removed disconnected IRC session");
                }
            });
        })
    }

    fn reconnect_delays(&self) -> crate::net::Backoff {
        crate::net::Backoff::new(self.reconnect_base_ms, self.reconnect_max_ms)
    }
}

impl Channel for IrcChannel {
    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }

    fn description(&self) -> &'static str {
        "The IRC channel allows events to be sent to IRC chat rooms and commands to be received from them."
    }
}

fn session_args() -> Vec<Arg> {
    vec![
        Arg {
            name: SERVER_ARG,
            description: "The IRC server to connect to (host or host:port).",
            default: None,
            required: true,
        },
        Arg {
            name: PASSWORD_ARG,
            description: "The password to connect to the IRC server with.",
            default: Some(""),
            required: false,
        },
        Arg {
            name: CHANNEL_ARG,
            description: "The IRC channel to join.",
            default: None,
            required: true,
        },
        Arg {
            name: NICKNAME_ARG,
            description: "The nickname to connect to the IRC server with.",
            default: Some("switchyard"),
            required: true,
        },
    ]
}

/// Resolve and check session arguments.
fn target_from_args(args: &Args) -> Result<IrcTarget, ChannelError> {
    let args = resolve_args(&session_args(), args)?;
    let get = |name: &str| args.get(name).cloned().unwrap_or_default();

    let target = IrcTarget {
        server: get(SERVER_ARG),
        password: get(PASSWORD_ARG),
        channel: get(CHANNEL_ARG),
        nickname: get(NICKNAME_ARG),
    };

    for (arg, value) in [
        (SERVER_ARG, &target.server),
        (PASSWORD_ARG, &target.password),
        (CHANNEL_ARG, &target.channel),
        (NICKNAME_ARG, &target.nickname),
    ] {
        if value.contains(char::is_control) {
            return Err(ChannelError::InvalidArg {
                arg: arg.into(),
                message: "cannot contain control characters".into(),
            });
        }
    }

    if !target.channel.starts_with(['#', '&']) || target.channel.contains([' ', ',']) {
        return Err(ChannelError::InvalidArg {
            arg: CHANNEL_ARG.into(),
            message: format!("'{}' is not a channel name", target.channel),
        });
    }
    if target.nickname.contains(char::is_whitespace) {
        return Err(ChannelError::InvalidArg {
            arg: NICKNAME_ARG.into(),
            message: "nickname cannot contain whitespace".into(),
        });
    }
    if target.server.contains(char::is_whitespace) {
        return Err(ChannelError::InvalidArg {
            arg: SERVER_ARG.into(),
            message: "server cannot contain whitespace".into(),
        });
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> Args {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_target_defaults() {
        let target = target_from_args(&args(&[(SERVER_ARG, "irc.example.org"), (CHANNEL_ARG, "#ops")])).unwrap();
        assert_eq!(target.nickname, "switchyard");
        assert_eq!(target.password, "");
        assert_eq!(target.key(), "irc.example.org:#ops:switchyard");
    }

    #[test]
    fn test_target_validation() {
        assert!(matches!(
            target_from_args(&args(&[(CHANNEL_ARG, "#ops")])),
            Err(ChannelError::MissingArg(name)) if name == SERVER_ARG
        ));
        assert!(matches!(
            target_from_args(&args(&[(SERVER_ARG, "irc.example.org"), (CHANNEL_ARG, "ops")])),
            Err(ChannelError::InvalidArg { .. })
        ));
        assert!(target_from_args(&args(&[
            (SERVER_ARG, "irc.example.org"),
            (CHANNEL_ARG, "#ops"),
            (NICKNAME_ARG, "two words"),
        ]))
        .is_err());
    }

    #[test]
    fn test_target_rejects_line_breaks() {
        for (arg, value) in [
            (CHANNEL_ARG, "#ops\r\nQUIT :bye"),
            (SERVER_ARG, "irc.example.org\r"),
            (NICKNAME_ARG, "yard\nJOIN"),
            (PASSWORD_ARG, "secret\r\nPRIVMSG #ops :hi"),
        ] {
            let mut pairs = vec![(SERVER_ARG, "irc.example.org"), (CHANNEL_ARG, "#ops")];
            pairs.retain(|(name, _)| *name != arg);
            pairs.push((arg, value));
            assert!(
                matches!(target_from_args(&args(&pairs)), Err(ChannelError::InvalidArg { arg: ref name, .. }) if name == arg),
                "{} accepted {:?}",
                arg,
                value
            );
        }
        assert!(target_from_args(&args(&[(SERVER_ARG, "irc.example.org"), (CHANNEL_ARG, "#ops room")])).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_registers_nothing() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel = IrcChannel::new(&ConnectionConfig::default());
        let target = IrcTarget {
            server: addr.to_string(),
            password: String::new(),
            channel: "#ops".into(),
            nickname: "switchyard".into(),
        };

        let err = channel.session(&target).await.unwrap_err();
        assert!(matches!(err, ChannelError::Connection(ConnectionError::Establish { .. })));
        assert!(channel.sessions().is_empty().await);
        assert_eq!(channel.active_sessions(), 0);
    }
}
