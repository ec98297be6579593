//! Protocol scenarios exercised by the harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Handshake carries every agent's spaces and reaches Ready
    Handshake,

    /// Actions for a subset of agents; a done agent stays in the batch
    SparseActions,

    /// Peer stop discards that reply's actions and ends the session
    PeerStop,

    /// Undecodable reply fails the session with nothing applied
    MalformedReply,

    /// Full episode followed by exactly one flush exchange
    SimulationEnd,

    /// Simulation ends before the first step; nothing is sent
    EarlySimulationEnd,

    /// Peer declines at init; the session never becomes Ready
    InitDeclined,

    /// Threaded random-action peer over an in-process channel
    RandomAgent,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Handshake,
            ScenarioId::SparseActions,
            ScenarioId::PeerStop,
            ScenarioId::MalformedReply,
            ScenarioId::SimulationEnd,
            ScenarioId::EarlySimulationEnd,
            ScenarioId::InitDeclined,
            ScenarioId::RandomAgent,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Handshake => "handshake",
            ScenarioId::SparseActions => "sparse_actions",
            ScenarioId::PeerStop => "peer_stop",
            ScenarioId::MalformedReply => "malformed_reply",
            ScenarioId::SimulationEnd => "simulation_end",
            ScenarioId::EarlySimulationEnd => "early_simulation_end",
            ScenarioId::InitDeclined => "init_declined",
            ScenarioId::RandomAgent => "random_agent",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Handshake => "Init carries all agents in order; ack moves the session to Ready",
            ScenarioId::SparseActions => "Only the last agent gets an action; a done agent keeps reporting",
            ScenarioId::PeerStop => "Stop reply discards its actions; later steps are usage errors",
            ScenarioId::MalformedReply => "Garbage reply is a protocol error and the session fails",
            ScenarioId::SimulationEnd => "Episode runs to sim time, then flushes one last state",
            ScenarioId::EarlySimulationEnd => "End before the first step closes without any message",
            ScenarioId::InitDeclined => "Peer asks to stop in its init ack",
            ScenarioId::RandomAgent => "Random peer on another thread drives a full episode",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "handshake" => Ok(ScenarioId::Handshake),
            "sparse_actions" | "sparse" => Ok(ScenarioId::SparseActions),
            "peer_stop" | "stop" => Ok(ScenarioId::PeerStop),
            "malformed_reply" | "malformed" => Ok(ScenarioId::MalformedReply),
            "simulation_end" | "end" => Ok(ScenarioId::SimulationEnd),
            "early_simulation_end" | "early_end" => Ok(ScenarioId::EarlySimulationEnd),
            "init_declined" | "declined" => Ok(ScenarioId::InitDeclined),
            "random_agent" | "random" => Ok(ScenarioId::RandomAgent),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
