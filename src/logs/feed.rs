//! Real-time log feed.
//!
//! Chec publishes every processed request to a Pusher channel named
//! `api.logs.<token>`. [`LogFeed`] speaks the Pusher websocket protocol
//! directly: it connects on first use, subscribes, and forwards the `log`
//! payload of each event to a single listener.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::NotificationCredentials;

/// Pusher cluster Chec publishes on.
pub const DEFAULT_HOST: &str = "wss://ws-us3.pusher.com";

const PROTOCOL_VERSION: u8 = 7;
const CLIENT_NAME: &str = "chec-cli";

/// Errors that can occur when subscribing to the feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("could not locate required credentials to subscribe to a log feed")]
    MissingCredentials,
}

/// A source of new log records.
pub trait Feed {
    /// Register the listener for incoming logs, connecting if needed.
    ///
    /// There is only ever one listener: registering again replaces it and
    /// closes the previous receiver.
    fn on_log(&mut self) -> Result<mpsc::UnboundedReceiver<Value>, FeedError>;

    /// Tear down the subscription. Does nothing when never connected.
    fn disconnect(&mut self);
}

/// The Pusher-backed feed.
pub struct LogFeed {
    credentials: Option<NotificationCredentials>,
    host: String,
    channel: Option<Channel>,
    closing: Option<JoinHandle<()>>,
}

/// A live subscription.
struct Channel {
    listener: watch::Sender<Option<mpsc::UnboundedSender<Value>>>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LogFeed {
    pub fn new(credentials: Option<NotificationCredentials>) -> Self {
        Self::with_host(credentials, DEFAULT_HOST)
    }

    /// Connect to another websocket host, e.g. `ws://127.0.0.1:6001`.
    pub fn with_host(credentials: Option<NotificationCredentials>, host: impl Into<String>) -> Self {
        Self {
            credentials,
            host: host.into(),
            channel: None,
            closing: None,
        }
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Wait for a disconnect to finish saying goodbye to the server.
    pub async fn closed(&mut self) {
        if let Some(task) = self.closing.take() {
            let _ = task.await;
        }
    }

    fn channel(&mut self) -> Result<&Channel, FeedError> {
        let channel = match self.channel.take() {
            Some(channel) => channel,
            None => self.connect()?,
        };
        Ok(self.channel.insert(channel))
    }

    fn connect(&self) -> Result<Channel, FeedError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(FeedError::MissingCredentials)?;

        let url = format!(
            "{}/app/{}?protocol={PROTOCOL_VERSION}&client={CLIENT_NAME}&version={}&flash=false",
            self.host,
            credentials.key,
            env!("CARGO_PKG_VERSION"),
        );
        let name = format!("api.logs.{}", credentials.token);
        tracing::debug!(channel = %name, "connecting to log feed");

        let (listener, listener_rx) = watch::channel(None);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(stream_channel(url, name, listener_rx, shutdown_rx));

        Ok(Channel {
            listener,
            shutdown,
            task,
        })
    }
}

impl Feed for LogFeed {
    fn on_log(&mut self) -> Result<mpsc::UnboundedReceiver<Value>, FeedError> {
        let channel = self.channel()?;
        let (tx, rx) = mpsc::unbounded_channel();
        channel.listener.send_replace(Some(tx));
        Ok(rx)
    }

    fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            let _ = channel.shutdown.send(());
            self.closing = Some(channel.task);
        }
    }
}

impl Drop for LogFeed {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Keep one channel subscription alive until told to stop.
async fn stream_channel(
    url: String,
    channel: String,
    listener: watch::Receiver<Option<mpsc::UnboundedSender<Value>>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut socket = tokio::select! {
        _ = &mut shutdown => return,
        connected = connect_async(url.as_str()) => match connected {
            Ok((socket, _)) => socket,
            Err(e) => {
                tracing::warn!(error = %e, "could not connect to the log feed");
                return;
            }
        },
    };

    if let Err(e) = socket.send(Message::Text(subscribe_frame(&channel))).await {
        tracing::warn!(error = %e, "could not subscribe to the log feed");
        return;
    }

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = socket.send(Message::Text(unsubscribe_frame(&channel))).await;
                let _ = socket.close(None).await;
                tracing::debug!(%channel, "log feed disconnected");
                return;
            }
            message = socket.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("log feed closed by the server");
                        return;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "log feed connection failed");
                        return;
                    }
                };

                match Frame::parse(&text) {
                    Some(Frame::Log(log)) => {
                        let tx = listener.borrow().clone();
                        if let Some(tx) = tx {
                            let _ = tx.send(log);
                        }
                    }
                    Some(Frame::Ping) => {
                        if let Err(e) = socket.send(Message::Text(pong_frame())).await {
                            tracing::warn!(error = %e, "could not answer feed ping");
                            return;
                        }
                    }
                    Some(Frame::Error(message)) => {
                        tracing::warn!(%message, "log feed reported an error");
                    }
                    Some(Frame::Other(event)) => tracing::trace!(%event, "feed event"),
                    None => tracing::debug!(%text, "unreadable feed message"),
                }
            }
        }
    }
}

/// The wire shape of every Pusher message.
#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// What a Pusher message means to us.
#[derive(Debug, PartialEq)]
enum Frame {
    /// A new log, unwrapped from its envelope.
    Log(Value),
    Ping,
    Error(String),
    Other(String),
}

impl Frame {
    fn parse(text: &str) -> Option<Self> {
        let envelope: Envelope = serde_json::from_str(text).ok()?;

        // Pusher double-encodes event data as a JSON string.
        let mut data = match envelope.data {
            Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            other => other,
        };

        Some(match envelope.event.as_str() {
            "log" => Self::Log(data.get_mut("log").map(Value::take)?),
            "pusher:ping" => Self::Ping,
            "pusher:error" => Self::Error(
                data.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            ),
            other => Self::Other(other.to_string()),
        })
    }
}

fn subscribe_frame(channel: &str) -> String {
    json!({"event": "pusher:subscribe", "data": {"channel": channel}}).to_string()
}

fn unsubscribe_frame(channel: &str) -> String {
    json!({"event": "pusher:unsubscribe", "data": {"channel": channel}}).to_string()
}

fn pong_frame() -> String {
    json!({"event": "pusher:pong", "data": {}}).to_string()
}
