use crate::backoff::{BackoffPolicy, ExponentialBackoff};
use crate::bus::{BusConsumer, MessageBus, SubscriptionId, DEFAULT_BUS_CAPACITY};
use crate::core::poller::Poller;
use crate::core::state::{AtomicStreamState, StreamState};
use crate::error::{Result, StreamError};
use crate::transport::{Payload, Transport, TransportFactory, TransportHooks};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Per-stream transform applied to every inbound payload before it reaches
/// the bus. Returning `None` swallows the payload.
pub type MessageHook = Box<dyn Fn(Payload) -> Option<Payload> + Send + Sync>;

type HookFactory = Box<dyn FnOnce(StreamHandle) -> MessageHook + Send>;

/// Self-healing message stream over a churn-prone connection.
///
/// Owns the current transport and a poller that re-opens one whenever the
/// previous one closes. Inbound payloads fan out through a [`MessageBus`]:
/// any number of synchronous listeners plus async iterating consumers, all
/// observing the same order. `send` always targets whatever transport is
/// currently live; nothing is buffered across reconnection gaps.
///
/// Disposal is explicit and terminal. Call [`dispose`](Self::dispose) when
/// done; dropping the handle without it leaves the reconnect task running.
pub struct ReconnectingStream {
    inner: Arc<StreamInner>,
    poller: Poller,
}

/// Construction-time knobs for [`ReconnectingStream`].
pub struct StreamOptions {
    backoff: Box<dyn BackoffPolicy>,
    bus_capacity: usize,
    hook_factory: Option<HookFactory>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            backoff: Box::new(ExponentialBackoff::default()),
            bus_capacity: DEFAULT_BUS_CAPACITY,
            hook_factory: None,
        }
    }
}

impl StreamOptions {
    /// Retry pacing for the reconnect loop.
    pub fn backoff(mut self, policy: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Box::new(policy);
        self
    }

    /// Capacity of the buffer behind the async consumer view.
    pub fn bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Install a per-stream message transform.
    ///
    /// The factory runs once at construction and receives a [`StreamHandle`]
    /// so the hook can close over the stream, e.g. to answer protocol-level
    /// pings without surfacing them:
    ///
    /// ```ignore
    /// let options = StreamOptions::default().message_hook(|handle| {
    ///     Box::new(move |payload| {
    ///         if payload.as_text() == Some("ping") {
    ///             let _ = handle.send(Payload::Text("pong".into()));
    ///             return None;
    ///         }
    ///         Some(payload)
    ///     })
    /// });
    /// ```
    pub fn message_hook<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(StreamHandle) -> MessageHook + Send + 'static,
    {
        self.hook_factory = Some(Box::new(factory));
        self
    }
}

struct StreamInner {
    label: String,
    factory: Arc<dyn TransportFactory>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    bus: MessageBus,
    hook: RwLock<Option<MessageHook>>,
    state: AtomicStreamState,
}

impl StreamInner {
    #[inline]
    fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    fn send(&self, payload: Payload) -> Result<()> {
        if self.is_disposed() {
            // Sends racing disposal are expected and must stay silent.
            return Ok(());
        }
        let transport = self.transport.lock().clone();
        match transport {
            Some(transport) => transport.send(payload),
            None => Err(StreamError::NotConnected),
        }
    }

    fn forward(&self, payload: Payload) {
        if self.is_disposed() {
            return;
        }
        let forwarded = {
            let hook = self.hook.read();
            match hook.as_ref() {
                Some(transform) => transform(payload),
                None => Some(payload),
            }
        };
        if let Some(payload) = forwarded {
            self.bus.emit(payload);
        }
    }
}

impl ReconnectingStream {
    /// Open a stream with default options and start connecting immediately.
    ///
    /// `label` attributes log lines to this stream.
    pub fn connect(label: impl Into<String>, factory: Arc<dyn TransportFactory>) -> Self {
        Self::with_options(label, factory, StreamOptions::default())
    }

    /// Open a stream with explicit options.
    pub fn with_options(
        label: impl Into<String>,
        factory: Arc<dyn TransportFactory>,
        options: StreamOptions,
    ) -> Self {
        let label = label.into();
        let inner = Arc::new(StreamInner {
            label: label.clone(),
            factory,
            transport: Mutex::new(None),
            bus: MessageBus::new(options.bus_capacity),
            hook: RwLock::new(None),
            state: AtomicStreamState::new(StreamState::Connecting),
        });

        if let Some(make_hook) = options.hook_factory {
            let handle = StreamHandle {
                inner: Arc::downgrade(&inner),
            };
            *inner.hook.write() = Some(make_hook(handle));
        }

        let cycle_inner = Arc::clone(&inner);
        let poller = Poller::start(&label, options.backoff, move || {
            connection_cycle(Arc::clone(&cycle_inner))
        });

        Self { inner, poller }
    }

    /// Send a payload over the current transport.
    ///
    /// A disposed stream swallows the call silently. If no transport is
    /// installed (a reconnect is mid-flight) this is a caller error and
    /// returns [`StreamError::NotConnected`]; a live transport's own send
    /// failure propagates as-is.
    pub fn send(&self, payload: Payload) -> Result<()> {
        self.inner.send(payload)
    }

    /// Tear everything down. Idempotent; safe to call from inside a
    /// listener or message hook.
    pub fn dispose(&self) {
        if self.inner.state.swap(StreamState::Disposed) == StreamState::Disposed {
            return;
        }
        info!("stream '{}': disposing", self.inner.label);

        // Order matters: stop the reconnect loop, silence and close the
        // live transport, then end distribution.
        self.poller.dispose();
        let transport = self.inner.transport.lock().take();
        if let Some(transport) = transport {
            transport.clear_hooks();
            transport.close();
        }
        self.inner.bus.clear();
    }

    /// Whether `dispose` has run. Reflects connection management, not the
    /// momentary existence of a transport.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Whether a transport is currently installed and forwarding.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state() == StreamState::Connected
    }

    #[inline]
    pub fn state(&self) -> StreamState {
        self.inner.state.get()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// A lightweight handle for closures that need to reach back into the
    /// stream without keeping it alive.
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register a synchronous listener on the bus.
    pub fn subscribe(&self, listener: impl Fn(&Payload) + Send + Sync + 'static) -> SubscriptionId {
        self.inner.bus.subscribe(listener)
    }

    /// Remove a listener registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// A single-pass async view over incoming messages, starting now.
    pub fn messages(&self) -> BusConsumer {
        self.inner.bus.consumer()
    }
}

/// Cloneable weak handle to a [`ReconnectingStream`].
///
/// Handed to message-hook factories; outliving the stream is fine, calls
/// on a dead handle behave like calls on a disposed stream.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Weak<StreamInner>,
}

impl StreamHandle {
    pub fn send(&self, payload: Payload) -> Result<()> {
        match self.inner.upgrade() {
            Some(inner) => inner.send(payload),
            None => Ok(()),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.upgrade().map_or(true, |inner| inner.is_disposed())
    }
}

/// One run of the poller's operation: open a transport, wire it up, idle
/// until it closes.
///
/// Returns `Ok(())` only when the stream is disposed, which is what ends
/// the retry loop. Every other outcome is an `Err` that sends the poller
/// into backoff.
async fn connection_cycle(inner: Arc<StreamInner>) -> Result<()> {
    if inner.is_disposed() {
        debug!("stream '{}': disposed, ending reconnect loop", inner.label);
        return Ok(());
    }

    let transport = inner.factory.connect().await?;

    // Supersede whatever was installed before. Its hooks go first so a
    // stale connection cannot deliver into the live stream.
    let previous = inner.transport.lock().replace(Arc::clone(&transport));
    if let Some(previous) = previous {
        previous.clear_hooks();
        previous.close();
    }

    let (closed_tx, closed_rx) = oneshot::channel::<()>();
    let closed_tx = Arc::new(Mutex::new(Some(closed_tx)));

    let hooks = TransportHooks {
        on_open: Some({
            let inner = Arc::clone(&inner);
            Arc::new(move || {
                inner.state.set_unless_disposed(StreamState::Connected);
            })
        }),
        on_close: Some({
            let closed_tx = Arc::clone(&closed_tx);
            Arc::new(move || {
                if let Some(tx) = closed_tx.lock().take() {
                    let _ = tx.send(());
                }
            })
        }),
        on_error: Some({
            let label = inner.label.clone();
            Arc::new(move |err: &StreamError| {
                warn!("stream '{}': transport error: {}", label, err);
            })
        }),
        on_message: Some({
            let inner = Arc::clone(&inner);
            Arc::new(move |payload: Payload| inner.forward(payload))
        }),
    };
    transport.install_hooks(hooks);
    // The close hook now holds the only sender; disposal dropping the hook
    // completes the wait below just like a close event would.
    drop(closed_tx);

    if !inner.state.set_unless_disposed(StreamState::Connected) {
        // Disposed while we were connecting; tear the fresh transport down
        // before it delivers anything.
        inner.transport.lock().take();
        transport.clear_hooks();
        transport.close();
        return Ok(());
    }
    info!("stream '{}': transport connected", inner.label);

    // Idle while connected: suspend until the transport reports closure.
    let _ = closed_rx.await;

    inner.state.set_unless_disposed(StreamState::Connecting);
    debug!("stream '{}': transport closed", inner.label);
    Err(StreamError::ConnectionClosed("transport closed".into()))
}
