//! Core machinery: the reconnecting stream, its poller, the message bus,
//! and the lifecycle state cell.

pub mod bus;
pub mod poller;
pub mod state;
pub mod stream;

// Re-export main types
pub use bus::{BusConsumer, Listener, MessageBus, SubscriptionId, DEFAULT_BUS_CAPACITY};
pub use poller::Poller;
pub use state::{AtomicStreamState, StreamState};
pub use stream::{MessageHook, ReconnectingStream, StreamHandle, StreamOptions};
