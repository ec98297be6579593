//! Agent-side counterpart of the session.
//!
//! [`PeerBridge`] drives the Reply end of the channel: it binds, answers the
//! init message, then alternates between receiving state batches and sending
//! actions.
//!
//! ```ignore
//! let mut peer = PeerBridge::new(ZmqTransport::replier()?);
//! peer.bind(&Endpoint::localhost(5555))?;
//! peer.initialize()?;
//! let mut state = peer.receive_state()?;
//! loop {
//!     let actions = peer.sample_actions(&mut rng);
//!     state = peer.step(actions)?;
//! }
//! ```

use crate::codec::{self, MultiAgentAct, MultiAgentInit, MultiAgentState, SimInitAck};
use crate::error::{BridgeError, UsageError};
use netgym_env::{AgentActionRecord, AgentId, AgentInitRecord, Endpoint, Transport};
use rand::Rng;
use tracing::{debug, info, warn};

pub struct PeerBridge<T: Transport> {
    transport: T,
    init: Option<MultiAgentInit>,
    /// A state batch was received and still awaits its reply
    pending_state: bool,
    stop_requested: bool,
    states_received: u64,
}

impl<T: Transport> PeerBridge<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            init: None,
            pending_state: false,
            stop_requested: false,
            states_received: 0,
        }
    }

    /// Binds the transport so the simulation can connect.
    pub fn bind(&mut self, endpoint: &Endpoint) -> Result<(), BridgeError> {
        self.transport.connect(endpoint)?;
        info!("Peer listening on port {}", endpoint.port);
        Ok(())
    }

    /// Waits for the init message and accepts the session.
    pub fn initialize(&mut self) -> Result<&MultiAgentInit, BridgeError> {
        self.answer_init(false)
    }

    /// Waits for the init message and asks the simulation to stop.
    pub fn decline(&mut self) -> Result<&MultiAgentInit, BridgeError> {
        self.answer_init(true)
    }

    fn answer_init(&mut self, stop: bool) -> Result<&MultiAgentInit, BridgeError> {
        if self.init.is_some() {
            return Err(UsageError::AlreadyInitialized.into());
        }

        let bytes = self.transport.receive()?;
        let init = match codec::decode_init(&bytes) {
            Ok(init) => init,
            Err(e) => {
                // Answer anyway so the simulation is not left waiting on its request
                warn!("Unreadable init message, asking the simulation to stop: {}", e);
                let ack = SimInitAck {
                    done: false,
                    stop_sim_requested: true,
                };
                self.transport.send(&codec::encode_init_ack(&ack)?)?;
                return Err(e.into());
            }
        };
        info!(
            "Init from simulation pid {} with {} agents",
            init.sim_process_id,
            init.agents.len()
        );

        let ack = SimInitAck {
            done: true,
            stop_sim_requested: stop,
        };
        self.transport.send(&codec::encode_init_ack(&ack)?)?;
        self.stop_requested = stop;

        Ok(&*self.init.insert(init))
    }

    /// Receives the next state batch.
    pub fn receive_state(&mut self) -> Result<MultiAgentState, BridgeError> {
        if self.init.is_none() {
            return Err(UsageError::NotInitialized.into());
        }
        if self.pending_state {
            return Err(UsageError::ReplyPending.into());
        }

        let bytes = self.transport.receive()?;
        let state = codec::decode_state(&bytes)?;
        self.pending_state = true;
        self.states_received += 1;
        debug!("Received state #{} ({} agents)", self.states_received, state.agents.len());
        Ok(state)
    }

    /// Replies to the pending state batch.
    ///
    /// Carries the stop flag if [`request_stop`](Self::request_stop) was called.
    pub fn send_actions(&mut self, actions: Vec<AgentActionRecord>) -> Result<(), BridgeError> {
        if !self.pending_state {
            return Err(UsageError::NoPendingState.into());
        }

        let reply = MultiAgentAct {
            stop_sim_requested: self.stop_requested,
            actions,
        };
        self.transport.send(&codec::encode_act(&reply)?)?;
        self.pending_state = false;
        Ok(())
    }

    /// Sends actions for the pending state, then waits for the next one.
    pub fn step(&mut self, actions: Vec<AgentActionRecord>) -> Result<MultiAgentState, BridgeError> {
        self.send_actions(actions)?;
        self.receive_state()
    }

    /// Makes every following reply ask the simulation to stop.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Answers a pending state with a stop request, if any.
    pub fn close(&mut self) -> Result<(), BridgeError> {
        if self.pending_state {
            self.request_stop();
            self.send_actions(Vec::new())?;
        }
        info!("Peer closed after {} states", self.states_received);
        Ok(())
    }

    /// One random action per agent that declared an action space.
    pub fn sample_actions(&self, rng: &mut impl Rng) -> Vec<AgentActionRecord> {
        self.agents()
            .iter()
            .filter_map(|record| {
                record
                    .act_space
                    .as_ref()
                    .map(|space| AgentActionRecord::new(record.agent_id, space.sample(rng)))
            })
            .collect()
    }

    /// Agents announced at init, in simulation order.
    pub fn agents(&self) -> &[AgentInitRecord] {
        self.init.as_ref().map(|i| i.agents.as_slice()).unwrap_or(&[])
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents().iter().map(|a| a.agent_id).collect()
    }

    pub fn init_message(&self) -> Option<&MultiAgentInit> {
        self.init.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.init.is_some()
    }

    pub fn has_pending_state(&self) -> bool {
        self.pending_state
    }

    pub fn states_received(&self) -> u64 {
        self.states_received
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
