//! Bridge Session - Simulation-side State Machine
//!
//! A [`Session`] owns one transport and one agent registry and drives the
//! strict request/reply exchange with the agent process.
//!
//! ```text
//! Created ──init──▶ Initializing ──ack──▶ Ready ◀──▶ Stepping
//!                        │                  │           │
//!                        │ stop             │ end       │ stop
//!                        ▼                  ▼           ▼
//!               PeerStopRequested        SimEnded ─▶ Closed
//!
//! any protocol/transport fault ──▶ Failed
//! ```
//!
//! The session is owned by the host and driven from the host's thread. It
//! never spawns threads and never exits the process; a stop requested by the
//! peer comes back as [`StepOutcome::PeerStopRequested`].

use crate::codec::{self, MultiAgentInit, MultiAgentState};
use crate::config::SessionConfig;
use crate::error::{BridgeError, ProtocolError, UsageError};
use crate::registry::AgentRegistry;
use netgym_env::{
    AgentActionRecord, AgentId, AgentInitRecord, AgentStateRecord, EnvironmentAdapter,
    SpaceDescriptor, Transport,
};
use std::collections::HashMap;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registry is being populated
    Created,
    /// Handshake in progress
    Initializing,
    /// Handshake done, waiting for the next step
    Ready,
    /// State batch in flight
    Stepping,
    /// Host announced the end; flush in flight
    SimEnded,
    /// Peer asked to stop (terminal)
    PeerStopRequested,
    /// Session ended normally (terminal)
    Closed,
    /// Protocol or transport fault (terminal)
    Failed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Stepping => "stepping",
            SessionState::SimEnded => "sim-ended",
            SessionState::PeerStopRequested => "peer-stop-requested",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }

    /// True for states that accept no further steps.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::PeerStopRequested | SessionState::Closed | SessionState::Failed
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Summary of one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepReport {
    /// 1-based index of this step
    pub step: u64,

    /// Number of actions the adapter accepted
    pub applied: usize,

    /// Agents whose action the adapter refused
    pub rejected: Vec<AgentId>,
}

/// What the host should do after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed; keep going
    Continue(StepReport),
    /// The peer asked the simulation to stop
    PeerStopRequested,
    /// The session is closed
    Closed,
}

impl StepOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, StepOutcome::Continue(_))
    }
}

/// Simulation-side bridge session.
pub struct Session<T: Transport> {
    id: Uuid,
    config: SessionConfig,
    transport: T,
    registry: AgentRegistry,
    state: SessionState,
    steps_completed: u64,
    /// Declared action spaces, kept only when validation is enabled
    action_spaces: HashMap<AgentId, SpaceDescriptor>,
}

impl<T: Transport> Session<T> {
    pub fn new(config: SessionConfig, transport: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            transport,
            registry: AgentRegistry::new(),
            state: SessionState::Created,
            steps_completed: 0,
            action_spaces: HashMap::new(),
        }
    }

    /// Adds an agent. Only allowed before the handshake.
    pub fn register_agent(&mut self, agent: impl Into<AgentId>) -> Result<(), BridgeError> {
        if self.state.is_terminal() {
            return Err(self.terminated());
        }
        self.registry.register(agent)?;
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn steps_completed(&self) -> u64 {
        self.steps_completed
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consumes the session and hands back the channel.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Performs the handshake if it has not happened yet.
    ///
    /// Called implicitly by the first [`step`](Self::step). Returns the state
    /// after the handshake: `Ready`, or `PeerStopRequested` if the peer
    /// declined.
    pub fn init<E>(&mut self, env: &mut E) -> Result<SessionState, BridgeError>
    where
        E: EnvironmentAdapter + ?Sized,
    {
        match self.state {
            SessionState::Created => {}
            SessionState::Failed => return Err(self.terminated()),
            other => return Ok(other),
        }

        let span = info_span!("session", id = %self.id, name = %self.config.name);
        let _enter = span.enter();

        self.state = SessionState::Initializing;

        if let Err(e) = self.registry.finalize() {
            error!("Cannot initialize session: {}", e);
            self.state = SessionState::Created;
            return Err(e.into());
        }

        if !self.transport.is_connected() {
            let endpoint = self.config.endpoint();
            if let Err(e) = self.transport.connect(&endpoint) {
                return Err(self.fail(e));
            }
            info!("Connected to {}", endpoint);
        }

        let records = self.collect_init_records(env);
        let message = MultiAgentInit::for_current_process(records);
        let bytes = match codec::encode_init(&message) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(e)),
        };

        let reply = match self.transport.round_trip(&bytes) {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail(e)),
        };
        let ack = match codec::decode_init_ack(&reply) {
            Ok(ack) => ack,
            Err(e) => return Err(self.fail(e)),
        };

        if ack.stop_sim_requested {
            info!("Peer declined the session during init");
            self.state = SessionState::PeerStopRequested;
        } else {
            info!("Session ready with {} agents", self.registry.len());
            self.state = SessionState::Ready;
        }
        Ok(self.state)
    }

    /// Runs one exchange: send every agent's state, apply the peer's actions.
    ///
    /// The first call performs the handshake first.
    pub fn step<E>(&mut self, env: &mut E) -> Result<StepOutcome, BridgeError>
    where
        E: EnvironmentAdapter + ?Sized,
    {
        if self.state == SessionState::Created
            && self.init(env)? == SessionState::PeerStopRequested
        {
            return Ok(StepOutcome::PeerStopRequested);
        }
        if self.state != SessionState::Ready {
            return Err(self.terminated());
        }

        let span = info_span!("session", id = %self.id, step = self.steps_completed + 1);
        let _enter = span.enter();

        self.state = SessionState::Stepping;

        let batch = self.collect_states(env);
        let bytes = match codec::encode_state(&batch) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(e)),
        };
        let reply = match self.transport.round_trip(&bytes) {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail(e)),
        };
        let act = match codec::decode_act(&reply) {
            Ok(act) => act,
            Err(e) => return Err(self.fail(e)),
        };

        if act.stop_sim_requested {
            info!(
                "Peer requested stop after {} steps ({} actions discarded)",
                self.steps_completed,
                act.actions.len()
            );
            self.state = SessionState::PeerStopRequested;
            return Ok(StepOutcome::PeerStopRequested);
        }

        if let Err(e) = self.validate(&act.actions) {
            return Err(self.fail(e));
        }

        let mut report = StepReport {
            step: self.steps_completed + 1,
            ..Default::default()
        };
        for AgentActionRecord { agent_id, action } in act.actions {
            if env.execute_action(agent_id, action) {
                report.applied += 1;
            } else {
                warn!("Adapter rejected action for {}", agent_id);
                report.rejected.push(agent_id);
            }
        }

        self.steps_completed += 1;
        self.state = SessionState::Ready;
        debug!(
            "Step {} done: {} applied, {} rejected",
            report.step,
            report.applied,
            report.rejected.len()
        );
        Ok(StepOutcome::Continue(report))
    }

    /// Tells the peer the simulation is over.
    ///
    /// If the handshake never happened nothing is sent. Otherwise one final
    /// state batch is flushed and its reply discarded. Either way the session
    /// ends `Closed`.
    pub fn notify_simulation_end<E>(&mut self, env: &mut E) -> Result<StepOutcome, BridgeError>
    where
        E: EnvironmentAdapter + ?Sized,
    {
        match self.state {
            SessionState::Created => {
                info!("Simulation ended before the handshake; nothing to flush");
                self.state = SessionState::Closed;
                return Ok(StepOutcome::Closed);
            }
            SessionState::Ready => {}
            SessionState::PeerStopRequested => return Ok(StepOutcome::PeerStopRequested),
            SessionState::Closed => return Ok(StepOutcome::Closed),
            _ => return Err(self.terminated()),
        }

        let span = info_span!("session", id = %self.id);
        let _enter = span.enter();

        self.state = SessionState::SimEnded;

        let batch = self.collect_states(env);
        let bytes = match codec::encode_state(&batch) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(e)),
        };
        let reply = match self.transport.round_trip(&bytes) {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail(e)),
        };
        if let Err(e) = codec::decode(&reply) {
            debug!("Ignoring undecodable flush reply: {}", e);
        }

        info!("Session closed after {} steps", self.steps_completed);
        self.state = SessionState::Closed;
        Ok(StepOutcome::Closed)
    }

    fn collect_init_records<E>(&mut self, env: &mut E) -> Vec<AgentInitRecord>
    where
        E: EnvironmentAdapter + ?Sized,
    {
        let mut records = Vec::with_capacity(self.registry.len());
        for &agent in &self.registry {
            let obs_space = env.observation_space(agent);
            let act_space = env.action_space(agent);
            if self.config.validate_actions {
                if let Some(space) = &act_space {
                    self.action_spaces.insert(agent, space.clone());
                }
            }
            records.push(AgentInitRecord {
                agent_id: agent,
                obs_space,
                act_space,
            });
        }
        records
    }

    fn collect_states<E>(&self, env: &mut E) -> MultiAgentState
    where
        E: EnvironmentAdapter + ?Sized,
    {
        let agents = self
            .registry
            .iter()
            .map(|&agent| AgentStateRecord {
                agent_id: agent,
                obs: env.observation(agent),
                reward: env.reward(agent),
                done: env.done(agent),
                info: env.info(agent),
            })
            .collect();
        MultiAgentState { agents }
    }

    /// Checks every record before any is applied.
    fn validate(&self, actions: &[AgentActionRecord]) -> Result<(), ProtocolError> {
        for record in actions {
            if !self.registry.contains(record.agent_id) {
                return Err(ProtocolError::UnknownAgent(record.agent_id));
            }
            if !self.config.validate_actions {
                continue;
            }
            if let Some(space) = self.action_spaces.get(&record.agent_id) {
                if !space.contains(&record.action) {
                    return Err(ProtocolError::InvalidAction {
                        agent: record.agent_id,
                        reason: format!(
                            "{} action does not fit the declared {} space",
                            record.action.kind_name(),
                            space.kind_name()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    fn fail(&mut self, e: impl Into<BridgeError>) -> BridgeError {
        let e = e.into();
        error!("Session failed in state {}: {}", self.state, e);
        self.state = SessionState::Failed;
        e
    }

    fn terminated(&self) -> BridgeError {
        UsageError::SessionTerminated {
            state: self.state.name(),
        }
        .into()
    }
}
