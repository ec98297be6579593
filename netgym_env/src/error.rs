//! Error types for the netgym transport layer.

use thiserror::Error;

/// Errors raised by a [`Transport`](crate::Transport) implementation.
///
/// None of these are retried; a transport error ends the session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting or binding to the endpoint failed
    #[error("Connect to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    /// `connect` was called a second time
    #[error("Transport already connected to {0}")]
    AlreadyConnected(String),

    /// `send`/`receive` called before `connect`
    #[error("Transport not connected")]
    NotConnected,

    /// Send failed (socket error, buffer full, etc.)
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// The peer closed the channel
    #[error("Peer closed the connection")]
    PeerClosed,

    /// Call order violated the strict request/reply alternation
    #[error("Out of sequence: expected {expected}, got {got}")]
    OutOfSequence {
        expected: &'static str,
        got: &'static str,
    },

    /// Frame exceeds the maximum size
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

impl TransportError {
    /// Creates a connect error.
    pub fn connect(endpoint: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::ConnectFailed {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a send error.
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }

    /// Creates a receive error.
    pub fn receive(msg: impl Into<String>) -> Self {
        Self::ReceiveFailed(msg.into())
    }
}
