//! Error types for the netgym bridge.
//!
//! Three failure classes reach the host:
//! - [`UsageError`]: the host (or peer driver) called something out of order
//! - [`ProtocolError`]: a message could not be carried, either because the
//!   peer sent something invalid or the host produced values the wire format
//!   cannot represent
//! - [`TransportError`]: the channel itself failed
//!
//! A peer-requested stop is not an error; it is a
//! [`StepOutcome`](crate::StepOutcome).

use crate::codec::CodecError;
use netgym_env::{AgentId, TransportError};
use thiserror::Error;

/// Caller violated the session or peer lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("Cannot register {agent}: registry already finalized")]
    RegistryFinalized { agent: AgentId },

    #[error("Cannot finalize an empty agent registry")]
    EmptyRegistry,

    #[error("Agent registry already finalized")]
    AlreadyFinalized,

    #[error("Session is {state} and accepts no further steps")]
    SessionTerminated { state: &'static str },

    #[error("Peer has not received the init message yet")]
    NotInitialized,

    #[error("Peer already answered the init message")]
    AlreadyInitialized,

    #[error("No state is pending a reply")]
    NoPendingState,

    #[error("A state is pending; reply before receiving another")]
    ReplyPending,
}

/// A message could not be carried over the protocol.
///
/// Covers peer replies the bridge cannot accept and host-side values (NaN
/// rewards, NaN space bounds) that cannot be encoded. Either way the session
/// fails.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Action for unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("Invalid action for {agent}: {reason}")]
    InvalidAction { agent: AgentId, reason: String },
}

/// Top-level error returned by session and peer operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl BridgeError {
    /// True if the caller misused the API rather than the peer or channel failing.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, BridgeError::Usage(_))
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, BridgeError::Protocol(_))
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(self, BridgeError::Transport(_))
    }
}

impl From<CodecError> for BridgeError {
    fn from(e: CodecError) -> Self {
        BridgeError::Protocol(ProtocolError::Codec(e))
    }
}

/// Errors loading a [`SessionConfig`](crate::SessionConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let usage: BridgeError = UsageError::EmptyRegistry.into();
        assert!(usage.is_usage_error());
        assert!(!usage.is_protocol_error());

        let protocol: BridgeError = ProtocolError::UnknownAgent(AgentId(7)).into();
        assert!(protocol.is_protocol_error());
        assert!(!protocol.is_usage_error());

        let transport: BridgeError = TransportError::PeerClosed.into();
        assert!(transport.is_transport_error());
    }

    #[test]
    fn test_messages_name_the_agent() {
        let err = UsageError::RegistryFinalized { agent: AgentId(3) };
        assert_eq!(
            err.to_string(),
            "Cannot register agent-3: registry already finalized"
        );
    }
}
