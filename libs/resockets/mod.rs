//! # Resockets
//!
//! A self-healing socket-stream abstraction: one logical connection that
//! survives transport churn and fans incoming messages out to both
//! synchronous listeners and async iterating consumers.
//!
//! ## Features
//!
//! - **Automatic reconnection**: a poller re-opens the transport with
//!   configurable backoff whenever it closes; callers never see the churn
//! - **Dual-mode delivery**: subscribe callbacks and `for await`-style
//!   consumption over the same ordered sequence
//! - **Deterministic teardown**: hooks on a superseded or disposed
//!   transport are cleared before it is closed, so stale connections
//!   cannot deliver
//! - **Pluggable transports**: anything implementing `Transport` /
//!   `TransportFactory`; a tokio-tungstenite WebSocket adapter is bundled
//!
//! ## Example
//!
//! ```rust,ignore
//! use resockets::{Payload, ReconnectingStream, WsTransportFactory};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> resockets::Result<()> {
//!     let factory = Arc::new(WsTransportFactory::new("wss://api.example.com/feed"));
//!     let stream = ReconnectingStream::connect("feed", factory);
//!
//!     stream.subscribe(|payload| println!("got: {:?}", payload));
//!
//!     let mut messages = stream.messages();
//!     while let Some(payload) = messages.recv().await {
//!         if payload.as_text() == Some("done") {
//!             break;
//!         }
//!     }
//!
//!     stream.dispose();
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod traits;
pub mod ws;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    bus, poller, state, stream,
    bus::{BusConsumer, MessageBus, SubscriptionId, DEFAULT_BUS_CAPACITY},
    poller::Poller,
    state::{AtomicStreamState, StreamState},
    stream::{MessageHook, ReconnectingStream, StreamHandle, StreamOptions},
};

// Re-export the bundled WebSocket transport
pub use ws::{WsTransport, WsTransportFactory};

/// Type alias for Result with StreamError
pub type Result<T> = std::result::Result<T, traits::StreamError>;
