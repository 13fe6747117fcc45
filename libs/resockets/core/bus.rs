//! Dual-mode message distribution.
//!
//! One ordered emission sequence, observable two ways at once:
//!
//! ```text
//! emit ──> listener 1 (sync, subscription order)
//!      ──> listener 2
//!      ──> broadcast buffer ──> consumer A (async, own cursor)
//!                           ──> consumer B
//! ```
//!
//! Every emission goes through a single serialization point, so listeners
//! and iterating consumers all observe the same relative order. Consumers
//! join at their subscription offset; nothing is replayed.

use crate::transport::Payload;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Default capacity of the broadcast buffer behind the async view.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Synchronous listener. Invoked inline at emission time.
pub type Listener = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Identifies one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registry {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
    /// None once cleared; dropping the sender ends every consumer.
    channel: Option<broadcast::Sender<Payload>>,
}

/// The distribution primitive behind a [`ReconnectingStream`](crate::ReconnectingStream).
pub struct MessageBus {
    registry: Mutex<Registry>,
    /// Serializes whole emissions. Separate from the registry lock so a
    /// listener can subscribe, unsubscribe, or clear the bus from inside
    /// its own callback. Do not emit from within a listener.
    emit_gate: Mutex<()>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            registry: Mutex::new(Registry {
                listeners: Vec::new(),
                next_id: 0,
                channel: Some(tx),
            }),
            emit_gate: Mutex::new(()),
        }
    }

    /// Deliver `payload` to every listener in subscription order, then to
    /// the async consumers. No-op once the bus is cleared.
    pub fn emit(&self, payload: Payload) {
        let _gate = self.emit_gate.lock();

        // Snapshot under the registry lock, invoke outside it: a listener
        // may re-enter the registry (e.g. by disposing the stream).
        let (listeners, sender) = {
            let registry = self.registry.lock();
            match registry.channel.as_ref() {
                None => return,
                Some(tx) => (
                    registry
                        .listeners
                        .iter()
                        .map(|(_, l)| Arc::clone(l))
                        .collect::<Vec<_>>(),
                    tx.clone(),
                ),
            }
        };

        for listener in &listeners {
            if self.is_cleared() {
                // A listener cleared the bus mid-emission; the rest of the
                // fan-out is no longer observable.
                return;
            }
            listener(&payload);
        }

        if !self.is_cleared() {
            // Err here just means no consumer is currently iterating.
            let _ = sender.send(payload);
        }
    }

    /// Register a synchronous listener. Listeners registered after `clear`
    /// are accepted but never invoked.
    pub fn subscribe(&self, listener: impl Fn(&Payload) + Send + Sync + 'static) -> SubscriptionId {
        let mut registry = self.registry.lock();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        if registry.channel.is_some() {
            registry.listeners.push((id, Arc::new(listener)));
        }
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(lid, _)| *lid != id);
        registry.listeners.len() != before
    }

    /// A single-pass asynchronous view starting at the current offset.
    pub fn consumer(&self) -> BusConsumer {
        let registry = self.registry.lock();
        BusConsumer {
            rx: registry.channel.as_ref().map(|tx| tx.subscribe()),
        }
    }

    /// Detach all listeners and end every consumer. Idempotent.
    ///
    /// A consumer currently awaiting the next value observes end of
    /// sequence, not an error.
    pub fn clear(&self) {
        let mut registry = self.registry.lock();
        registry.listeners.clear();
        registry.channel = None;
    }

    pub fn is_cleared(&self) -> bool {
        self.registry.lock().channel.is_none()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// Single-pass asynchronous view over the bus's emission sequence.
pub struct BusConsumer {
    rx: Option<broadcast::Receiver<Payload>>,
}

impl BusConsumer {
    /// Next emission, or `None` once the bus is cleared.
    ///
    /// Suspends until a value is available. A consumer that falls behind
    /// the buffer capacity skips forward to the oldest retained emission.
    pub async fn recv(&mut self) -> Option<Payload> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("bus consumer lagged, skipped {} messages", skipped);
                }
            }
        }
    }

    /// Adapt to a [`futures::Stream`] of payloads.
    pub fn into_stream(self) -> impl futures::Stream<Item = Payload> + Send {
        futures::stream::unfold(self, |mut consumer| async move {
            consumer.recv().await.map(|payload| (payload, consumer))
        })
    }
}
