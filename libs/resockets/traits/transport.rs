//! Transport contract: one physical connection plus the hook registry the
//! stream installs on it.
//!
//! A [`Transport`] is a black box that can push opaque payloads in both
//! directions and report open/close/error events. The stream owns the
//! installed [`TransportHooks`] and clears them deterministically whenever a
//! connection is superseded or the stream is disposed, so a torn-down
//! transport can never deliver events into a live stream.

use crate::error::{Result, StreamError};
use async_trait::async_trait;
use std::sync::Arc;

/// Opaque message payload carried by a transport.
/// Can be text or binary data; the stream never inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Get the payload as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Binary(_) => None,
        }
    }

    /// Get the payload as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Payload::Text(_) => None,
            Payload::Binary(b) => Some(b),
        }
    }

    /// Check if payload is text
    pub fn is_text(&self) -> bool {
        matches!(self, Payload::Text(_))
    }

    /// Check if payload is binary
    pub fn is_binary(&self) -> bool {
        matches!(self, Payload::Binary(_))
    }
}

/// Hook invoked when a transport finishes opening.
pub type OpenHook = Arc<dyn Fn() + Send + Sync>;
/// Hook invoked exactly once when a transport stops delivering.
pub type CloseHook = Arc<dyn Fn() + Send + Sync>;
/// Hook invoked on recoverable transport-level errors.
pub type ErrorHook = Arc<dyn Fn(&StreamError) + Send + Sync>;
/// Hook invoked for every inbound payload.
pub type MessageHookSlot = Arc<dyn Fn(Payload) + Send + Sync>;

/// Event hooks for one transport connection.
///
/// Each slot is single-writer: installing a new set replaces the previous
/// one wholesale, and installing `TransportHooks::default()` (all `None`)
/// clears every slot. Implementations must invoke hooks without holding
/// their own hook lock, since a hook may dispose the owning stream.
#[derive(Clone, Default)]
pub struct TransportHooks {
    pub on_open: Option<OpenHook>,
    pub on_close: Option<CloseHook>,
    pub on_error: Option<ErrorHook>,
    pub on_message: Option<MessageHookSlot>,
}

/// One physical connection capable of sending and receiving opaque payloads.
pub trait Transport: Send + Sync + 'static {
    /// Send a payload over the connection.
    ///
    /// Must not block: implementations queue the payload and report only
    /// local failures (e.g. the connection task already exited).
    fn send(&self, payload: Payload) -> Result<()>;

    /// Tear the connection down. Idempotent.
    ///
    /// Whether this fires `on_close` is up to the implementation; the stream
    /// always clears hooks before closing, so a locally initiated close is
    /// never observed as a remote one.
    fn close(&self);

    /// Install a full set of hooks, replacing whatever was installed before.
    fn install_hooks(&self, hooks: TransportHooks);

    /// Clear every hook slot. Events occurring afterwards are dropped.
    fn clear_hooks(&self) {
        self.install_hooks(TransportHooks::default());
    }
}

/// Produces a new live transport connection.
///
/// Called exactly once per reconnection attempt. An `Err` fails the attempt
/// and feeds the poller's backoff; there is no distinction between refusing
/// immediately and failing mid-handshake.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn Transport>>;
}
