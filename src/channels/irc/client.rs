//! Minimal IRC client session.
//!
//! # Handshake
//! ```text
//! connect TCP
//!     → PASS (if set), NICK, USER
//!     ← 001 RPL_WELCOME        → JOIN #channel
//!     ← :nick!user@host JOIN   → ready
//!     ← 432/433/464/465/ERROR  → handshake failed
//!     ← PING                   → PONG (any time)
//! ```
//!
//! A session owns a reader task and a writer task. Both are aborted when
//! the session is dropped, so a handshake abandoned by a timeout leaves
//! nothing running.

use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::net::{ConnectionId, SessionGuard, SessionTracker};

const MESSAGE_BUFFER: usize = 256;
/// Longest inbound line kept; the rest of a longer line is discarded.
const MAX_LINE_BYTES: usize = 8192;
pub const DEFAULT_PORT: u16 = 6667;

#[derive(Debug, Error)]
pub enum IrcError {
    #[error("IRC connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IRC server rejected the session: {0}")]
    Rejected(String),

    #[error("IRC connection closed")]
    Closed,
}

/// One parsed protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Line {
    pub fn parse(raw: &str) -> Option<Line> {
        let mut rest = raw.trim_end_matches(['\r', '\n']);

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ')?;
                rest = tail;
                Some(prefix.to_string())
            }
            None => None,
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Some(Line {
            prefix,
            command,
            params,
        })
    }

    /// Nickname part of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        (!nick.is_empty()).then_some(nick)
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// Where and as whom a session connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcTarget {
    pub server: String,
    pub password: String,
    pub channel: String,
    pub nickname: String,
}

impl IrcTarget {
    /// Registry key: `server:channel:nickname`.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.server, self.channel, self.nickname)
    }

    /// `host:port`, defaulting the port.
    pub fn address(&self) -> String {
        if self.server.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
            self.server.clone()
        } else {
            format!("{}:{}", self.server, DEFAULT_PORT)
        }
    }
}

/// A channel message seen by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender nickname; `None` when the line had no prefix.
    pub from: Option<String>,
    pub target: String,
    pub text: String,
}

/// Live, joined IRC session.
pub struct IrcSession {
    target: IrcTarget,
    outbound: mpsc::UnboundedSender<String>,
    messages: broadcast::Sender<ChatMessage>,
    closed: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
    guard: SessionGuard,
}

/// Called once from the reader task when an established connection drops.
pub type OnClose = Box<dyn FnOnce(ConnectionId) + Send + 'static>;

impl IrcSession {
    /// Connect, register and join `target.channel`.
    ///
    /// Resolves once the server echoes our JOIN. Carries no timeout of its
    /// own; callers bound it.
    pub async fn connect(
        target: IrcTarget,
        tracker: &SessionTracker,
        on_close: OnClose,
    ) -> Result<IrcSession, IrcError> {
        let stream = TcpStream::connect(target.address()).await?;
        let (read_half, mut write_half) = stream.into_split();

        let guard = tracker.track();
        let id = guard.id();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (messages, _) = broadcast::channel(MESSAGE_BUFFER);
        let (closed_tx, closed) = watch::channel(false);
        let (ready_tx, ready_rx) = oneshot::channel();

        let writer = tokio::spawn(async move {
            while let Some(line) = outbound_rx.recv().await {
                let framed = format!("{}\r\n", line);
                if let Err(e) = write_half.write_all(framed.as_bytes()).await {
                    tracing::debug!(connection_id = %id, error = %e, "IRC write failed");
                    break;
                }
            }
        });

        let reader = tokio::spawn(read_loop(
            id,
            target.clone(),
            BufReader::new(read_half),
            outbound.clone(),
            messages.clone(),
            closed_tx,
            ready_tx,
            on_close,
        ));

        let session = IrcSession {
            target,
            outbound,
            messages,
            closed,
            tasks: vec![reader, writer],
            guard,
        };

        if !session.target.password.is_empty() {
            session.send_raw(format!("PASS {}", session.target.password))?;
        }
        session.send_raw(format!("NICK {}", session.target.nickname))?;
        session.send_raw(format!(
            "USER {} 0 * :{}",
            session.target.nickname, session.target.nickname
        ))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                tracing::info!(connection_id = %id, connection_key = %session.target.key(), "IRC session ready");
                Ok(session)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(IrcError::Closed),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    pub fn target(&self) -> &IrcTarget {
        &self.target
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wait until the connection drops.
    pub async fn wait_closed(&self) {
        let mut closed = self.closed.clone();
        loop {
            if *closed.borrow_and_update() {
                return;
            }
            if closed.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.messages.subscribe()
    }

    /// Send every non-empty line of `text` to the joined channel.
    ///
    /// CR, LF and NUL all end a line so content can never start a new
    /// protocol command.
    pub fn privmsg(&self, text: &str) -> Result<(), IrcError> {
        for line in text.split(['\r', '\n', '\0']).map(str::trim_end).filter(|l| !l.is_empty()) {
            self.send_raw(format!("PRIVMSG {} :{}", self.target.channel, line))?;
        }
        Ok(())
    }

    fn send_raw(&self, line: String) -> Result<(), IrcError> {
        if self.is_closed() {
            return Err(IrcError::Closed);
        }
        self.outbound.send(line).map_err(|_| IrcError::Closed)
    }
}

impl Drop for IrcSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl fmt::Debug for IrcSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrcSession")
            .field("id", &self.id())
            .field("target", &self.target)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[allow(clippy::too_many_arguments)]
async fn read_loop(
    id: ConnectionId,
    target: IrcTarget,
    mut reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    outbound: mpsc::UnboundedSender<String>,
    messages: broadcast::Sender<ChatMessage>,
    closed: watch::Sender<bool>,
    ready: oneshot::Sender<Result<(), IrcError>>,
    on_close: OnClose,
) {
    let mut ready = Some(ready);
    let mut established = false;
    let mut buf = Vec::new();

    loop {
        match read_line_capped(&mut reader, &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "IRC read failed");
                break;
            }
        }

        let text = String::from_utf8_lossy(&buf);
        let Some(line) = Line::parse(&text) else {
            continue;
        };
        tracing::trace!(connection_id = %id, command = %line.command, "IRC line received");

        match line.command.as_str() {
            "PING" => {
                let token = line.param(0).unwrap_or_default();
                let _ = outbound.send(format!("PONG :{}", token));
            }
            "001" => {
                let _ = outbound.send(format!("JOIN {}", target.channel));
            }
            "JOIN" => {
                let joined = line.param(0).is_some_and(|c| c.eq_ignore_ascii_case(&target.channel));
                let ours = line.nick().is_some_and(|n| n.eq_ignore_ascii_case(&target.nickname));
                if joined && ours {
                    if let Some(ready) = ready.take() {
                        established = ready.send(Ok(())).is_ok();
                    }
                }
            }
            "432" | "433" | "464" | "465" | "471" | "473" | "474" | "475" | "ERROR" => {
                if let Some(ready) = ready.take() {
                    let reason = line.params.last().cloned().unwrap_or_else(|| line.command.clone());
                    let _ = ready.send(Err(IrcError::Rejected(format!("{} {}", line.command, reason))));
                    break;
                }
            }
            "PRIVMSG" => {
                if let (Some(to), Some(text)) = (line.param(0), line.param(1)) {
                    let _ = messages.send(ChatMessage {
                        from: line.nick().map(str::to_string),
                        target: to.to_string(),
                        text: text.to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    closed.send_replace(true);

    // Only sessions that finished the handshake are registered
    if established {
        tracing::info!(connection_id = %id, connection_key = %target.key(), "IRC session disconnected");
        on_close(id);
    }
}

/// Read one line into `buf`, keeping at most [`MAX_LINE_BYTES`].
///
/// Returns the number of bytes kept; zero means end of stream.
async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let kept = (&mut *reader).take(MAX_LINE_BYTES as u64).read_until(b'\n', buf).await?;
    if kept < MAX_LINE_BYTES || buf.last() == Some(&b'\n') {
        return Ok(kept);
    }

    let mut overflow = Vec::new();
    loop {
        overflow.clear();
        let skipped = (&mut *reader).take(MAX_LINE_BYTES as u64).read_until(b'\n', &mut overflow).await?;
        if skipped == 0 || overflow.last() == Some(&b'\n') {
            return Ok(kept);
        }
    }
}
