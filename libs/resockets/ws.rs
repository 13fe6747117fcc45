//! Bundled WebSocket transport built on tokio-tungstenite.
//!
//! [`WsTransport`] adapts one established WebSocket connection to the
//! [`Transport`] hook contract. A single task drives both directions, so
//! closure is observed in exactly one place: the read side ending, a write
//! failure, or a local `close` all funnel into one `on_close` invocation.

use crate::error::{Result, StreamError};
use crate::transport::{Payload, Transport, TransportFactory, TransportHooks};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// One WebSocket connection behind the [`Transport`] contract.
///
/// `send` enqueues without blocking; the connection task drains the queue.
/// Protocol pings are answered internally and never surface as payloads.
/// The `on_open` slot is accepted but never fired: a `WsTransport` only
/// exists once the handshake has already completed.
pub struct WsTransport {
    hooks: Arc<RwLock<TransportHooks>>,
    outbound: mpsc::UnboundedSender<Payload>,
    shutdown: Arc<Notify>,
}

impl WsTransport {
    /// Dial `url` and wrap the resulting connection.
    pub async fn connect(url: &str) -> Result<Arc<Self>> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;
        debug!("ws transport connected to {}", url);
        Ok(Self::from_stream(ws))
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(ws: WsStream) -> Arc<Self> {
        let (write, read) = ws.split();
        let hooks = Arc::new(RwLock::new(TransportHooks::default()));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(run_connection(
            write,
            read,
            Arc::clone(&hooks),
            outbound_rx,
            Arc::clone(&shutdown),
        ));

        Arc::new(Self {
            hooks,
            outbound,
            shutdown,
        })
    }
}

impl Transport for WsTransport {
    fn send(&self, payload: Payload) -> Result<()> {
        self.outbound
            .send(payload)
            .map_err(|_| StreamError::Transport("connection task gone".into()))
    }

    fn close(&self) {
        // notify_one stores a permit, so closing before the task reaches
        // its select still takes effect.
        self.shutdown.notify_one();
    }

    fn install_hooks(&self, hooks: TransportHooks) {
        *self.hooks.write() = hooks;
    }
}

/// Connection task: pump frames in, payloads out, until something ends.
async fn run_connection(
    mut write: WsSink,
    mut read: WsSource,
    hooks: Arc<RwLock<TransportHooks>>,
    mut outbound: mpsc::UnboundedReceiver<Payload>,
    shutdown: Arc<Notify>,
) {
    let reason = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => deliver(&hooks, Payload::Text(text)),
                Some(Ok(Message::Binary(data))) => deliver(&hooks, Payload::Binary(data)),
                Some(Ok(Message::Ping(data))) => {
                    if write.send(Message::Pong(data)).await.is_err() {
                        break "write side gone";
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => break "close frame received",
                Some(Err(e)) => {
                    let on_error = hooks.read().on_error.clone();
                    if let Some(on_error) = on_error {
                        on_error(&StreamError::Transport(e.to_string()));
                    }
                    break "read error";
                }
                None => break "stream ended",
            },
            maybe_payload = outbound.recv() => match maybe_payload {
                Some(payload) => {
                    let message = match payload {
                        Payload::Text(text) => Message::Text(text),
                        Payload::Binary(data) => Message::Binary(data),
                    };
                    if let Err(e) = write.send(message).await {
                        warn!("ws send failed: {}", e);
                        break "write error";
                    }
                }
                // Every sender dropped: the owning transport is gone.
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break "transport dropped";
                }
            },
            _ = shutdown.notified() => {
                let _ = write.send(Message::Close(None)).await;
                break "closed locally";
            }
        }
    };

    debug!("ws connection task exiting: {}", reason);
    let on_close = hooks.read().on_close.clone();
    if let Some(on_close) = on_close {
        on_close();
    }
}

/// Invoke the message slot outside the hook lock; hooks may re-enter the
/// transport (e.g. to send a reply or dispose the stream).
fn deliver(hooks: &RwLock<TransportHooks>, payload: Payload) {
    let on_message = hooks.read().on_message.clone();
    if let Some(on_message) = on_message {
        on_message(payload);
    }
}

/// [`TransportFactory`] that dials the same URL for every attempt.
pub struct WsTransportFactory {
    url: String,
}

impl WsTransportFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TransportFactory for WsTransportFactory {
    async fn connect(&self) -> Result<Arc<dyn Transport>> {
        let transport = WsTransport::connect(&self.url).await?;
        Ok(transport as Arc<dyn Transport>)
    }
}
