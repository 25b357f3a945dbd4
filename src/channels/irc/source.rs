//! IRC source: turns channel messages into events.
//!
//! A message addressed to the bot (`@switchyard deploy api`) becomes
//!
//! ```text
//! {"from": "alice", "msg": "deploy api", "args": {"0": "deploy", "1": "api"}}
//! ```
//!
//! parsed as JSON, with the first word as the only hint. Configure event
//! types whose hint is the command word.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::channels::irc::{session_args, target_from_args, IrcChannel, IrcSession, IrcTarget, NAMESPACE_ARG};
use crate::channels::{Arg, Args, Channel, ChannelError, Info, SinkChannel, SourceChannel, SourceStart};
use crate::event::EventIntake;
use crate::lifecycle::ShutdownSignal;

use super::ChatMessage;

const DEFAULT_NAMESPACE: &str = "0";

/// Remove a leading `@nick`, `nick:` or `nick,` address from `text`.
pub fn strip_mention<'a>(text: &'a str, nickname: &str) -> &'a str {
    let text = text.trim();
    let rest = text.strip_prefix('@').unwrap_or(text);

    let n = nickname.len();
    if rest.len() >= n && rest.is_char_boundary(n) && rest[..n].eq_ignore_ascii_case(nickname) {
        let after = &rest[n..];
        if after.is_empty() || after.starts_with([':', ',', ' ']) {
            return after.trim_start_matches([':', ',']).trim_start();
        }
    }
    text
}

/// JSON document and hint for a command message. `None` for empty messages.
pub fn command_document(from: &str, msg: &str) -> Option<(Value, String)> {
    let args: Map<String, Value> = msg
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| (i.to_string(), Value::String(word.to_string())))
        .collect();
    let hint = args.get("0")?.as_str()?.to_string();
    Some((json!({"from": from, "msg": msg, "args": args}), hint))
}

impl IrcChannel {
    /// Keep a session for `target` open until shutdown, re-establishing
    /// it with backoff whenever it drops.
    async fn watch(
        self,
        target: IrcTarget,
        namespace: String,
        intake: Arc<EventIntake>,
        mut shutdown: ShutdownSignal,
    ) {
        let key = target.key();
        let mut backoff = self.reconnect_delays();

        loop {
            if shutdown.is_triggered() {
                return;
            }

            match self.session(&target).await {
                Ok(session) => {
                    backoff.reset();
                    tracing::info!(connection_key = %key, namespace = %namespace, "Watching IRC channel");
                    if !self.pump(&session, &target, &namespace, &intake, &mut shutdown).await {
                        return;
                    }
                    tracing::info!(connection_key = %key, "IRC session lost");
                }
                Err(e) => {
                    tracing::debug!(connection_key = %key, error = %e, attempt = backoff.attempts() + 1, "IRC watch attempt failed");
                }
            }

            let delay = backoff.next_delay();
            tracing::info!(connection_key = %key, delay = ?delay, "Reconnecting to IRC");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => return,
            }
        }
    }

    /// Forward messages until the session drops (`true`) or shutdown (`false`).
    async fn pump(
        &self,
        session: &IrcSession,
        target: &IrcTarget,
        namespace: &str,
        intake: &EventIntake,
        shutdown: &mut ShutdownSignal,
    ) -> bool {
        let mut messages = session.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.recv() => return false,
                _ = session.wait_closed() => return true,
                received = messages.recv() => match received {
                    Ok(message) => self.handle_message(session, target, namespace, intake, message),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(connection_key = %target.key(), skipped, "IRC source lagging, messages dropped");
                    }
                    Err(RecvError::Closed) => return true,
                },
            }
        }
    }

    fn handle_message(
        &self,
        session: &IrcSession,
        target: &IrcTarget,
        namespace: &str,
        intake: &EventIntake,
        message: ChatMessage,
    ) {
        if !message.target.eq_ignore_ascii_case(&target.channel) {
            return;
        }
        let Some(from) = message.from.as_deref() else {
            report(session, "Unable to determine message sender.");
            return;
        };

        let msg = strip_mention(&message.text, &target.nickname);
        let Some((document, hint)) = command_document(from, msg) else {
            return;
        };

        let raw = match serde_json::to_vec(&document) {
            Ok(raw) => raw,
            Err(e) => {
                report(session, &format!("Unable to handle message from {}: {}", from, e));
                return;
            }
        };

        if let Err(e) = intake.ingest(self.name(), namespace, raw, &[hint]) {
            report(session, &format!("Unable to handle message from {}: {}", from, e));
        }
    }
}

fn report(session: &IrcSession, text: &str) {
    tracing::warn!(connection_key = %session.target().key(), "{}", text);
    if let Err(e) = session.privmsg(text) {
        tracing::debug!(error = %e, "Could not report IRC error to channel");
    }
}

#[async_trait]
impl SourceChannel for IrcChannel {
    fn source_args(&self) -> Vec<Arg> {
        let mut args = session_args();
        args.push(Arg {
            name: NAMESPACE_ARG,
            description: "Namespace given to events from this channel.",
            default: Some(DEFAULT_NAMESPACE),
            required: false,
        });
        args
    }

    fn validate_source_args(&self, args: &Args) -> Result<(), ChannelError> {
        target_from_args(args).map(|_| ())
    }

    fn source_info(&self, args: &Args) -> Vec<Info> {
        self.sink_info(args)
    }

    async fn start_source(
        &self,
        start: SourceStart,
        intake: Arc<EventIntake>,
        shutdown: ShutdownSignal,
    ) -> Result<(), ChannelError> {
        let mut watchers = Vec::new();
        for args in &start.sources {
            let target = match target_from_args(args) {
                Ok(target) => target,
                Err(e) => {
                    tracing::warn!(channel = self.name(), error = %e, "Skipping IRC source with invalid args");
                    continue;
                }
            };
            let namespace = args
                .get(NAMESPACE_ARG)
                .filter(|ns| !ns.is_empty())
                .cloned()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

            watchers.push(tokio::spawn(self.clone().watch(
                target,
                namespace,
                Arc::clone(&intake),
                shutdown.clone(),
            )));
        }

        if watchers.is_empty() {
            tracing::info!(channel = self.name(), "No IRC sources configured");
            return Ok(());
        }

        join_all(watchers).await;
        Ok(())
    }
}
