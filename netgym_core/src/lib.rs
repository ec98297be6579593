//! netgym Core - Simulation ⇄ RL Agent Bridge
//!
//! Couples a discrete-event network simulation hosting many agents with one
//! external agent process over a strictly alternating request/reply channel:
//! 1. **Handshake**: once, every agent's observation and action space goes out
//!    and the peer acknowledges (or declines)
//! 2. **Step**: every step, all agents' states go out in registration order
//!    and the peer answers with actions for any subset of them
//! 3. **End**: one final state batch is flushed when the simulation finishes
//!
//! The simulation side is [`Session`]; the agent side is [`PeerBridge`].

pub mod codec;
pub mod config;
pub mod error;
pub mod peer;
pub mod registry;
pub mod session;

// Re-export key types for convenience
pub use codec::{CodecError, MultiAgentAct, MultiAgentInit, MultiAgentState, SimInitAck, WireMessage};
pub use config::SessionConfig;
pub use error::{BridgeError, ConfigError, ProtocolError, UsageError};
pub use peer::PeerBridge;
pub use registry::AgentRegistry;
pub use session::{Session, SessionState, StepOutcome, StepReport};
