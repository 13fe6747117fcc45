use thiserror::Error;

/// Main error type for resockets
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// The transport reported closure. Fails the current connection cycle
    /// internally; the poller recovers by opening a fresh transport, so this
    /// never reaches callers of the stream.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Transport-level failure: the factory could not produce a connection,
    /// or a send on a live connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// `send` was called while no transport is installed (a reconnection
    /// attempt is mid-flight). The stream does not buffer across gaps.
    #[error("no live transport, reconnect in flight")]
    NotConnected,
}

/// Result type for resockets operations
pub type Result<T> = std::result::Result<T, StreamError>;
