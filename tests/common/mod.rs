//! Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use switchyard::channels::{Arg, Args, Channel, ChannelError, Info, SinkChannel};
use switchyard::event::Event;

/// How the fake IRC server answers a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    /// Welcome, then echo JOINs.
    Welcome,
    /// Never answer.
    Silent,
    /// Refuse the nickname.
    NickInUse,
}

#[derive(Debug, Clone)]
enum Control {
    Send(String),
    SendBytes(Vec<u8>),
    DropAll,
}

/// Minimal IRC server that records what clients send.
pub struct FakeIrcServer {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    lines: mpsc::UnboundedReceiver<String>,
    control: broadcast::Sender<Control>,
}

impl FakeIrcServer {
    pub async fn start(greeting: Greeting) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let (lines_tx, lines) = mpsc::unbounded_channel();
        let (control, _) = broadcast::channel(64);

        let accepted = Arc::clone(&connections);
        let control_tx = control.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                let lines_tx = lines_tx.clone();
                let mut control_rx = control_tx.subscribe();

                tokio::spawn(async move {
                    let (read_half, mut write_half) = socket.into_split();
                    let mut reader = BufReader::new(read_half).lines();
                    let mut nick = String::from("*");

                    loop {
                        tokio::select! {
                            line = reader.next_line() => {
                                let Ok(Some(line)) = line else { break };
                                let _ = lines_tx.send(line.clone());

                                let mut words = line.split_whitespace();
                                let reply = match (words.next(), words.next()) {
                                    (Some("NICK"), Some(n)) => {
                                        nick = n.to_string();
                                        None
                                    }
                                    (Some("USER"), _) => match greeting {
                                        Greeting::Welcome => Some(format!(":fake 001 {} :Welcome", nick)),
                                        Greeting::Silent => None,
                                        Greeting::NickInUse => {
                                            Some(format!(":fake 433 * {} :Nickname is already in use", nick))
                                        }
                                    },
                                    (Some("JOIN"), Some(channel)) => {
                                        Some(format!(":{}!~{}@localhost JOIN {}", nick, nick, channel))
                                    }
                                    _ => None,
                                };

                                if let Some(reply) = reply {
                                    if write_half.write_all(format!("{}\r\n", reply).as_bytes()).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            control = control_rx.recv() => match control {
                                Ok(Control::Send(line)) => {
                                    if write_half.write_all(format!("{}\r\n", line).as_bytes()).await.is_err() {
                                        break;
                                    }
                                }
                                Ok(Control::SendBytes(mut bytes)) => {
                                    bytes.extend_from_slice(b"\r\n");
                                    if write_half.write_all(&bytes).await.is_err() {
                                        break;
                                    }
                                }
                                Ok(Control::DropAll) | Err(_) => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            lines,
            control,
        }
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Write a raw line to every connected client.
    pub fn send(&self, line: &str) {
        let _ = self.control.send(Control::Send(line.to_string()));
    }

    /// Write a line that need not be UTF-8 to every connected client.
    pub fn send_bytes(&self, line: &[u8]) {
        let _ = self.control.send(Control::SendBytes(line.to_vec()));
    }

    /// Close every client connection.
    pub fn drop_all(&self) {
        let _ = self.control.send(Control::DropAll);
    }

    /// Wait for the next received line containing `needle`.
    pub async fn expect_line(&mut self, needle: &str) -> String {
        let wait = async {
            loop {
                match self.lines.recv().await {
                    Some(line) if line.contains(needle) => return line,
                    Some(_) => continue,
                    None => panic!("fake IRC server stopped"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("no line containing '{}'", needle))
    }

    /// Every line received so far.
    pub fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.lines.try_recv() {
            lines.push(line);
        }
        lines
    }
}

/// Delivery seen by a [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct Delivered {
    pub sink: &'static str,
    pub args: Args,
    pub source: String,
    pub event_type: String,
    pub content: String,
}

/// Sink that forwards every delivery to a channel.
pub struct RecordingSink {
    name: &'static str,
    tx: mpsc::UnboundedSender<Delivered>,
}

impl RecordingSink {
    pub fn new(name: &'static str) -> (Self, mpsc::UnboundedReceiver<Delivered>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { name, tx }, rx)
    }
}

impl Channel for RecordingSink {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "Records deliveries."
    }
}

#[async_trait]
impl SinkChannel for RecordingSink {
    fn sink_args(&self) -> Vec<Arg> {
        Vec::new()
    }

    fn validate_sink_args(&self, _args: &Args) -> Result<(), ChannelError> {
        Ok(())
    }

    fn sink_info(&self, _args: &Args) -> Vec<Info> {
        Vec::new()
    }

    async fn start_sink(&self, _settings: &Args) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn drain(&self, args: &Args, event: &Event, content: &str) -> Result<(), ChannelError> {
        let _ = self.tx.send(Delivered {
            sink: self.name,
            args: args.clone(),
            source: event.source.clone(),
            event_type: event.event_type.clone(),
            content: content.to_string(),
        });
        Ok(())
    }
}

/// Next delivery, failing the test after a second.
pub async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<Delivered>) -> Delivered {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no delivery within a second")
        .expect("sink dropped")
}

/// Assert nothing else arrives for a short while.
pub async fn assert_no_delivery(rx: &mut mpsc::UnboundedReceiver<Delivered>) {
    let next = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(next.is_err(), "unexpected delivery: {:?}", next);
}

/// Poll `check` until it holds or a few seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

pub fn args(pairs: &[(&str, &str)]) -> Args {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Event with an empty object, as handed to a sink.
pub fn event(namespace: &str, source: &str, event_type: &str) -> Event {
    Event {
        id: uuid::Uuid::new_v4(),
        origin: "test".into(),
        namespace: namespace.into(),
        source: source.into(),
        event_type: event_type.into(),
        parser_name: "json".into(),
        content: String::new(),
        raw_content: b"{}".to_vec(),
        object: serde_json::json!({}),
    }
}
