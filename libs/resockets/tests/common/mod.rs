//! Common test utilities for resockets integration tests.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use resockets::{Payload, Result, StreamError, Transport, TransportFactory, TransportHooks};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Initialize log output for a test run (controlled by TEST_VERBOSE).
#[allow(dead_code)]
pub fn init_tracing() {
    if std::env::var("TEST_VERBOSE").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// A scriptable in-memory transport: tests drive its events by hand and
/// inspect what the stream did to it.
pub struct ScriptedTransport {
    pub id: &'static str,
    hooks: RwLock<TransportHooks>,
    sent: Mutex<Vec<Payload>>,
    close_calls: AtomicUsize,
    fail_sends: AtomicBool,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            hooks: RwLock::new(TransportHooks::default()),
            sent: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
        })
    }

    /// Make every subsequent `send` fail.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::Release);
    }

    pub fn fire_open(&self) {
        let hook = self.hooks.read().on_open.clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub fn fire_close(&self) {
        let hook = self.hooks.read().on_close.clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub fn fire_error(&self, err: StreamError) {
        let hook = self.hooks.read().on_error.clone();
        if let Some(hook) = hook {
            hook(&err);
        }
    }

    pub fn fire_message(&self, payload: Payload) {
        let hook = self.hooks.read().on_message.clone();
        if let Some(hook) = hook {
            hook(payload);
        }
    }

    pub fn hooks_installed(&self) -> bool {
        self.hooks.read().on_message.is_some()
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Acquire)
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, payload: Payload) -> Result<()> {
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(StreamError::Transport(format!("{}: send refused", self.id)));
        }
        self.sent.lock().push(payload);
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::AcqRel);
    }

    fn install_hooks(&self, hooks: TransportHooks) {
        *self.hooks.write() = hooks;
    }
}

/// Hands out a queue of scripted transports, one per connect; errors once
/// the queue runs dry (simulating an outage the poller keeps retrying).
pub struct ScriptedFactory {
    queue: Mutex<VecDeque<Arc<ScriptedTransport>>>,
    connects: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedFactory {
    pub fn with_transports(
        transports: impl IntoIterator<Item = Arc<ScriptedTransport>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(transports.into_iter().collect()),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with_transports(Vec::new())
    }

    /// How many times the stream has asked for a connection.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }
}

#[async_trait]
impl TransportFactory for ScriptedFactory {
    async fn connect(&self) -> Result<Arc<dyn Transport>> {
        self.connects.fetch_add(1, Ordering::AcqRel);
        match self.queue.lock().pop_front() {
            Some(transport) => Ok(transport as Arc<dyn Transport>),
            None => Err(StreamError::Transport("no transport available".into())),
        }
    }
}

/// A simple echo WebSocket server for exercising the bundled transport.
#[allow(dead_code)]
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

#[allow(dead_code)]
impl MockWsServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_accept = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_accept.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_accept.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("websocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_ping() {
                                let pong = Message::Pong(msg.into_data());
                                if write.send(pong).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
