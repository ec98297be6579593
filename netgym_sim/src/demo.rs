//! Probe environment used by the scenarios and the `--connect` demo.
//!
//! Every agent observes a tuple holding one random `uint` reading in
//! `[0, 10]`, picks one of five discrete actions, and earns a reward that
//! grows by one each step.

use netgym_core::{BridgeError, PeerBridge};
use netgym_env::{
    AgentId, BoxData, DataContainer, Dtype, Endpoint, EnvironmentAdapter, SpaceDescriptor,
    Transport, TransportError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Number of discrete actions per agent.
pub const ACTION_COUNT: u64 = 5;

/// Upper bound of the observed reading.
pub const READING_MAX: u64 = 10;

#[derive(Debug, Default, Clone, Copy)]
struct AgentCounters {
    observed: u64,
    reward: f32,
}

pub struct ProbeEnv {
    rng: ChaCha8Rng,
    counters: HashMap<AgentId, AgentCounters>,
    done_agents: HashSet<AgentId>,
    executed: Vec<(AgentId, DataContainer)>,
}

impl ProbeEnv {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            counters: HashMap::new(),
            done_agents: HashSet::new(),
            executed: Vec::new(),
        }
    }

    /// Reports `done = true` for this agent from now on.
    pub fn mark_done(&mut self, agent: AgentId) {
        self.done_agents.insert(agent);
    }

    /// Actions applied so far, in order.
    pub fn executed(&self) -> &[(AgentId, DataContainer)] {
        &self.executed
    }

    /// Number of observations served to this agent.
    pub fn observed(&self, agent: AgentId) -> u64 {
        self.counters.get(&agent).map(|c| c.observed).unwrap_or(0)
    }

    pub fn observation_descriptor() -> SpaceDescriptor {
        SpaceDescriptor::tuple(vec![SpaceDescriptor::bounded_box(
            0.0,
            READING_MAX as f64,
            vec![1],
            Dtype::Uint,
        )])
    }
}

impl EnvironmentAdapter for ProbeEnv {
    fn observation_space(&mut self, _agent: AgentId) -> Option<SpaceDescriptor> {
        Some(Self::observation_descriptor())
    }

    fn action_space(&mut self, _agent: AgentId) -> Option<SpaceDescriptor> {
        Some(SpaceDescriptor::discrete(ACTION_COUNT))
    }

    fn observation(&mut self, agent: AgentId) -> Option<DataContainer> {
        let reading = self.rng.gen_range(0..=READING_MAX);
        self.counters.entry(agent).or_default().observed += 1;
        Some(DataContainer::tuple(vec![DataContainer::boxed(
            Some(vec![1]),
            BoxData::Uint(vec![reading]),
        )]))
    }

    fn reward(&mut self, agent: AgentId) -> f32 {
        let counters = self.counters.entry(agent).or_default();
        counters.reward += 1.0;
        counters.reward
    }

    fn done(&mut self, agent: AgentId) -> bool {
        self.done_agents.contains(&agent)
    }

    fn info(&mut self, agent: AgentId) -> String {
        format!("step={}", self.observed(agent))
    }

    fn execute_action(&mut self, agent: AgentId, action: DataContainer) -> bool {
        let accepted = action.as_discrete().is_some();
        debug!("{} action {:?} accepted={}", agent, action, accepted);
        if accepted {
            self.executed.push((agent, action));
        }
        accepted
    }
}

/// Drives a random-action peer until the simulation goes away.
///
/// With `stop_after`, the peer asks the simulation to stop once it has seen
/// that many state batches. Returns the number of state batches received.
pub fn run_random_peer<T: Transport>(
    transport: T,
    endpoint: &Endpoint,
    seed: u64,
    stop_after: Option<u64>,
) -> Result<u64, BridgeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut peer = PeerBridge::new(transport);
    peer.bind(endpoint)?;
    peer.initialize()?;
    peer.receive_state()?;

    loop {
        if stop_after.is_some_and(|n| peer.states_received() >= n) {
            peer.close()?;
            break;
        }
        let actions = peer.sample_actions(&mut rng);
        match peer.step(actions) {
            Ok(_) => {}
            Err(BridgeError::Transport(TransportError::PeerClosed)) => break,
            Err(e) => return Err(e),
        }
    }

    info!("Random peer done after {} states", peer.states_received());
    Ok(peer.states_received())
}
