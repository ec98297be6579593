//! Wire Codec - Bridge Message Serialization
//!
//! Four message kinds travel over the channel, strictly alternating:
//!
//! ```text
//! Simulation                                   Agent process
//!   |-- MultiAgentInit ---------------------------->|   (once)
//!   |<-------------------------------- SimInitAck --|   (once)
//!   |-- MultiAgentState --------------------------->|   (every step)
//!   |<----------------------------- MultiAgentAct --|   (every step)
//! ```
//!
//! Each message is a UTF-8 JSON object with a `"type"` tag. Spaces and data
//! containers carry a nested `"kind"` tag. Message boundaries come from the
//! transport (ZeroMQ frames or length-prefixed TCP frames).
//!
//! All functions here are pure; the codec owns no state.

use netgym_env::{AgentActionRecord, AgentId, AgentInitRecord, AgentStateRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest encoded message accepted in either direction (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// One-time handshake sent by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAgentInit {
    /// Process id of the simulation
    pub sim_process_id: u32,

    /// Process id of the simulation's parent (launcher shell)
    pub parent_process_id: u32,

    /// One record per registered agent, in registry order
    pub agents: Vec<AgentInitRecord>,
}

impl MultiAgentInit {
    /// Builds an init message stamped with this process's ids.
    pub fn for_current_process(agents: Vec<AgentInitRecord>) -> Self {
        Self {
            sim_process_id: std::process::id(),
            parent_process_id: parent_process_id(),
            agents,
        }
    }
}

#[cfg(unix)]
fn parent_process_id() -> u32 {
    std::os::unix::process::parent_id()
}

#[cfg(not(unix))]
fn parent_process_id() -> u32 {
    0
}

/// Peer's answer to [`MultiAgentInit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInitAck {
    pub done: bool,
    pub stop_sim_requested: bool,
}

/// Per-step state batch sent by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAgentState {
    /// One record per registered agent, in registry order
    pub agents: Vec<AgentStateRecord>,
}

/// Per-step reply carrying the peer's actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAgentAct {
    pub stop_sim_requested: bool,

    /// May omit agents; empty on the first step after a reset
    #[serde(default)]
    pub actions: Vec<AgentActionRecord>,
}

impl MultiAgentAct {
    /// A reply carrying actions and no stop request.
    pub fn with_actions(actions: Vec<AgentActionRecord>) -> Self {
        Self {
            stop_sim_requested: false,
            actions,
        }
    }

    /// A reply asking the simulation to stop.
    pub fn stop() -> Self {
        Self {
            stop_sim_requested: true,
            actions: Vec::new(),
        }
    }
}

/// Envelope over every message kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    MultiAgentInit(MultiAgentInit),
    SimInitAck(SimInitAck),
    MultiAgentState(MultiAgentState),
    MultiAgentAct(MultiAgentAct),
}

impl WireMessage {
    /// Returns the `"type"` tag of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            WireMessage::MultiAgentInit(_) => "multi_agent_init",
            WireMessage::SimInitAck(_) => "sim_init_ack",
            WireMessage::MultiAgentState(_) => "multi_agent_state",
            WireMessage::MultiAgentAct(_) => "multi_agent_act",
        }
    }
}

/// Errors for encoding and decoding wire messages.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// NaN or infinite data, or a NaN space bound
    #[error("Non-finite value in record for {agent}")]
    NonFinite { agent: AgentId },
}

/// Serializes any wire message.
pub fn encode(message: &WireMessage) -> Result<Vec<u8>, CodecError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::PayloadTooLarge {
            size: bytes.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(bytes)
}

/// Parses any wire message.
pub fn decode(bytes: &[u8]) -> Result<WireMessage, CodecError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::PayloadTooLarge {
            size: bytes.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(serde_json::from_slice(bytes)?)
}

// ============================================================================
// SIMULATION SIDE
// ============================================================================

/// Encodes the one-time init message. Box bounds may be infinite but not NaN.
pub fn encode_init(init: &MultiAgentInit) -> Result<Vec<u8>, CodecError> {
    for record in &init.agents {
        let nan_bound = [&record.obs_space, &record.act_space]
            .into_iter()
            .flatten()
            .any(|space| space.has_nan_bound());
        if nan_bound {
            return Err(CodecError::NonFinite {
                agent: record.agent_id,
            });
        }
    }
    encode(&WireMessage::MultiAgentInit(init.clone()))
}

/// Decodes the peer's init acknowledgement.
pub fn decode_init_ack(bytes: &[u8]) -> Result<SimInitAck, CodecError> {
    match decode(bytes)? {
        WireMessage::SimInitAck(ack) => Ok(ack),
        other => Err(unexpected("sim_init_ack", &other)),
    }
}

/// Encodes a state batch. Rewards and observations must be finite.
pub fn encode_state(state: &MultiAgentState) -> Result<Vec<u8>, CodecError> {
    for record in &state.agents {
        let obs_finite = record.obs.as_ref().map(|o| o.is_finite()).unwrap_or(true);
        if !record.reward.is_finite() || !obs_finite {
            return Err(CodecError::NonFinite {
                agent: record.agent_id,
            });
        }
    }
    encode(&WireMessage::MultiAgentState(state.clone()))
}

/// Decodes the peer's action batch.
pub fn decode_act(bytes: &[u8]) -> Result<MultiAgentAct, CodecError> {
    match decode(bytes)? {
        WireMessage::MultiAgentAct(act) => Ok(act),
        other => Err(unexpected("multi_agent_act", &other)),
    }
}

// ============================================================================
// AGENT SIDE
// ============================================================================

/// Decodes the simulation's init message.
pub fn decode_init(bytes: &[u8]) -> Result<MultiAgentInit, CodecError> {
    match decode(bytes)? {
        WireMessage::MultiAgentInit(init) => Ok(init),
        other => Err(unexpected("multi_agent_init", &other)),
    }
}

/// Encodes the init acknowledgement.
pub fn encode_init_ack(ack: &SimInitAck) -> Result<Vec<u8>, CodecError> {
    encode(&WireMessage::SimInitAck(*ack))
}

/// Decodes a state batch.
pub fn decode_state(bytes: &[u8]) -> Result<MultiAgentState, CodecError> {
    match decode(bytes)? {
        WireMessage::MultiAgentState(state) => Ok(state),
        other => Err(unexpected("multi_agent_state", &other)),
    }
}

/// Encodes an action batch. Action data must be finite.
pub fn encode_act(act: &MultiAgentAct) -> Result<Vec<u8>, CodecError> {
    if let Some(bad) = act.actions.iter().find(|a| !a.action.is_finite()) {
        return Err(CodecError::NonFinite {
            agent: bad.agent_id,
        });
    }
    encode(&WireMessage::MultiAgentAct(act.clone()))
}

fn unexpected(expected: &'static str, got: &WireMessage) -> CodecError {
    CodecError::UnexpectedMessage {
        expected,
        got: got.type_name(),
    }
}
