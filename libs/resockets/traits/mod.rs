//! # Resockets Traits
//!
//! Core traits and types for the resockets resilient-stream library:
//!
//! - **Transport / TransportFactory**: one physical connection and the
//!   operation that opens a fresh one per reconnection attempt
//! - **TransportHooks**: the hook registry the stream installs on each
//!   transport and clears on every transition
//! - **BackoffPolicy**: retry pacing for the poller
//! - **StreamError**: the crate error taxonomy

pub mod backoff;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use backoff::{BackoffPolicy, ExponentialBackoff, FixedDelay, NoRetry};
pub use error::{Result, StreamError};
pub use transport::{
    CloseHook, ErrorHook, MessageHookSlot, OpenHook, Payload, Transport, TransportFactory,
    TransportHooks,
};
