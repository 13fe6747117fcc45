use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`ReconnectingStream`](crate::ReconnectingStream).
///
/// Connecting and Connected alternate for the life of the stream; Disposed
/// is terminal and reachable from either. Factory failures and transport
/// closures are not distinct states, they are just causes for another
/// Connecting cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    /// No open transport; a reconnection attempt is in flight.
    Connecting = 0,
    /// A transport is installed and forwarding messages.
    Connected = 1,
    /// Terminal: poller stopped, transport torn down, bus cleared.
    Disposed = 2,
}

fn from_u8(value: u8) -> StreamState {
    match value {
        0 => StreamState::Connecting,
        1 => StreamState::Connected,
        _ => StreamState::Disposed,
    }
}

/// Lock-free state cell.
pub struct AtomicStreamState(AtomicU8);

impl AtomicStreamState {
    pub fn new(state: StreamState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> StreamState {
        from_u8(self.0.load(Ordering::Acquire))
    }

    /// Unconditionally store `state`, returning the previous value.
    pub fn swap(&self, state: StreamState) -> StreamState {
        from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }

    /// Store `state` unless the cell is already Disposed.
    ///
    /// Disposal is terminal; a racing connection cycle must never resurrect
    /// the stream. Returns whether the store happened.
    pub fn set_unless_disposed(&self, state: StreamState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == StreamState::Disposed as u8 {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                state as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.get() == StreamState::Disposed
    }
}
