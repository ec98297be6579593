//! Scenario runner - executes the protocol scenarios.

use crate::context::SimContext;
use crate::demo::{run_random_peer, ProbeEnv, ACTION_COUNT};
use crate::episode::{EpisodeRunner, SimConfig};
use crate::loopback::LoopbackTransport;
use crate::scenarios::ScenarioId;
use crate::script::ScriptedTransport;

use netgym_core::{BridgeError, Session, SessionState, StepOutcome};
use netgym_env::{AgentActionRecord, AgentId, DataContainer, SpaceDescriptor};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Derived-seed stream for the probe environment.
const ENV_STREAM: u64 = 1;

/// Derived-seed stream for the random peer.
const PEER_STREAM: u64 = 2;

/// Why a scenario failed.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Peer failed: {0}")]
    Peer(String),
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Assertion(message()))
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Steps completed
    pub steps: u64,

    /// Messages the simulation side sent
    pub messages: usize,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

#[derive(Debug, Default)]
struct ScenarioStats {
    steps: u64,
    messages: usize,
    sim_time: Duration,
}

/// Runs protocol scenarios.
pub struct ScenarioRunner {
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_agents: usize) -> Self {
        Self {
            config: SimConfig {
                seed,
                num_agents,
                ..Default::default()
            },
        }
    }

    pub fn from_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Sets the simulated time per episode.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.config.sim_time_ms = (secs * 1000.0).round() as u64;
        self
    }

    /// Sets the simulated time between steps.
    pub fn with_step_time(mut self, secs: f64) -> Self {
        self.config.step_time_ms = (secs * 1000.0).round() as u64;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);

        let outcome = match scenario {
            ScenarioId::Handshake => self.run_handshake(),
            ScenarioId::SparseActions => self.run_sparse_actions(),
            ScenarioId::PeerStop => self.run_peer_stop(),
            ScenarioId::MalformedReply => self.run_malformed_reply(),
            ScenarioId::SimulationEnd => self.run_simulation_end(),
            ScenarioId::EarlySimulationEnd => self.run_early_simulation_end(),
            ScenarioId::InitDeclined => self.run_init_declined(),
            ScenarioId::RandomAgent => self.run_random_agent(),
        };

        match outcome {
            Ok(stats) => ScenarioResult {
                scenario,
                seed: self.config.seed,
                passed: true,
                steps: stats.steps,
                messages: stats.messages,
                final_time_secs: stats.sim_time.as_secs_f64(),
                failure_reason: None,
            },
            Err(e) => ScenarioResult {
                scenario,
                seed: self.config.seed,
                passed: false,
                steps: 0,
                messages: 0,
                final_time_secs: 0.0,
                failure_reason: Some(e.to_string()),
            },
        }
    }

    fn agent_ids(&self) -> Result<Vec<AgentId>, ScenarioError> {
        ensure(self.config.num_agents > 0, || {
            "scenario needs at least one agent".to_string()
        })?;
        Ok((0..self.config.num_agents as u32).map(AgentId).collect())
    }

    fn scripted_session(
        &self,
        transport: ScriptedTransport,
    ) -> Result<Session<ScriptedTransport>, ScenarioError> {
        let mut session = Session::new(self.config.session_config(), transport);
        for id in self.agent_ids()? {
            session.register_agent(id)?;
        }
        Ok(session)
    }

    fn probe_env(&self, ctx: &SimContext) -> ProbeEnv {
        ProbeEnv::new(ctx.derive_rng(ENV_STREAM))
    }

    /// Init carries all agents in registration order; ack leads to Ready.
    fn run_handshake(&self) -> Result<ScenarioStats, ScenarioError> {
        let ctx = SimContext::new(self.config.seed);
        let mut env = self.probe_env(&ctx);
        let mut session = self.scripted_session(ScriptedTransport::new().with_ack(false))?;

        let state = session.init(&mut env)?;
        ensure(state == SessionState::Ready, || format!("state {} after ack", state))?;

        let init = session
            .transport()
            .sent_init()
            .ok_or_else(|| ScenarioError::Assertion("no init message sent".to_string()))?;
        let ids: Vec<AgentId> = init.agents.iter().map(|a| a.agent_id).collect();
        ensure(ids == self.agent_ids()?, || format!("init agent order {:?}", ids))?;
        ensure(
            init.agents
                .iter()
                .all(|a| a.act_space == Some(SpaceDescriptor::discrete(ACTION_COUNT))),
            || "action space missing from init".to_string(),
        )?;
        ensure(init.sim_process_id == std::process::id(), || {
            "init carries the wrong process id".to_string()
        })?;

        // A second init is a no-op
        session.init(&mut env)?;
        let messages = session.transport().sent().len();
        ensure(messages == 1, || format!("{} messages after double init", messages))?;

        Ok(ScenarioStats {
            messages,
            ..Default::default()
        })
    }

    /// Only the last agent gets an action; the first is done.
    fn run_sparse_actions(&self) -> Result<ScenarioStats, ScenarioError> {
        let ids = self.agent_ids()?;
        let (first, last) = (ids[0], ids[ids.len() - 1]);

        let ctx = SimContext::new(self.config.seed);
        let mut env = self.probe_env(&ctx);
        env.mark_done(first);

        let transport = ScriptedTransport::new()
            .with_ack(false)
            .with_actions(vec![AgentActionRecord::new(last, DataContainer::discrete(2))]);
        let mut session = self.scripted_session(transport)?;

        match session.step(&mut env)? {
            StepOutcome::Continue(report) => {
                ensure(report.applied == 1, || format!("{} actions applied", report.applied))?
            }
            other => return Err(ScenarioError::Assertion(format!("step returned {:?}", other))),
        }
        ensure(env.executed() == [(last, DataContainer::discrete(2))], || {
            format!("executed {:?}", env.executed())
        })?;

        let states = session.transport().sent_states();
        ensure(states.len() == 1, || format!("{} state batches", states.len()))?;
        let batch = &states[0];
        let batch_ids: Vec<AgentId> = batch.agents.iter().map(|a| a.agent_id).collect();
        ensure(batch_ids == ids, || format!("batch order {:?}", batch_ids))?;
        ensure(batch.agents[0].done, || "done flag missing".to_string())?;
        ensure(batch.agents[1..].iter().all(|a| !a.done), || {
            "unexpected done flag".to_string()
        })?;

        Ok(ScenarioStats {
            steps: session.steps_completed(),
            messages: session.transport().sent().len(),
            ..Default::default()
        })
    }

    /// A stop reply ends the session without applying its actions.
    fn run_peer_stop(&self) -> Result<ScenarioStats, ScenarioError> {
        let ids = self.agent_ids()?;
        let all_actions = |value: u64| {
            ids.iter()
                .map(|&id| AgentActionRecord::new(id, DataContainer::discrete(value)))
                .collect::<Vec<_>>()
        };

        let ctx = SimContext::new(self.config.seed);
        let mut env = self.probe_env(&ctx);
        let transport = ScriptedTransport::new()
            .with_ack(false)
            .with_actions(all_actions(1))
            .with_stop(all_actions(3));
        let mut session = self.scripted_session(transport)?;

        ensure(session.step(&mut env)?.is_continue(), || "first step".to_string())?;
        let outcome = session.step(&mut env)?;
        ensure(outcome == StepOutcome::PeerStopRequested, || {
            format!("second step returned {:?}", outcome)
        })?;
        ensure(env.executed().len() == ids.len(), || {
            format!("{} actions executed", env.executed().len())
        })?;

        match session.step(&mut env) {
            Err(e) if e.is_usage_error() => {}
            other => {
                return Err(ScenarioError::Assertion(format!(
                    "step after stop returned {:?}",
                    other
                )))
            }
        }
        let end = session.notify_simulation_end(&mut env)?;
        ensure(end == StepOutcome::PeerStopRequested, || format!("end returned {:?}", end))?;

        let messages = session.transport().sent().len();
        ensure(messages == 3, || format!("{} messages sent", messages))?;

        Ok(ScenarioStats {
            steps: session.steps_completed(),
            messages,
            ..Default::default()
        })
    }

    /// Undecodable reply: protocol error, Failed, nothing applied.
    fn run_malformed_reply(&self) -> Result<ScenarioStats, ScenarioError> {
        let ctx = SimContext::new(self.config.seed);
        let mut env = self.probe_env(&ctx);
        let transport = ScriptedTransport::new()
            .with_ack(false)
            .with_raw(b"\x00{\"type\":\"multi_agent_act\"".to_vec());
        let mut session = self.scripted_session(transport)?;

        match session.step(&mut env) {
            Err(e) if e.is_protocol_error() => debug!("Expected failure: {}", e),
            other => {
                return Err(ScenarioError::Assertion(format!(
                    "malformed reply returned {:?}",
                    other
                )))
            }
        }
        ensure(session.state() == SessionState::Failed, || {
            format!("state {}", session.state())
        })?;
        ensure(env.executed().is_empty(), || "actions applied".to_string())?;
        ensure(
            session.step(&mut env).is_err_and(|e| e.is_usage_error()),
            || "failed session accepted a step".to_string(),
        )?;

        Ok(ScenarioStats {
            messages: session.transport().sent().len(),
            ..Default::default()
        })
    }

    /// Full episode, then exactly one flush exchange.
    fn run_simulation_end(&self) -> Result<ScenarioStats, ScenarioError> {
        let ids = self.agent_ids()?;
        let expected = self.config.expected_steps();

        let mut transport = ScriptedTransport::new().with_ack(false);
        for step in 0..expected {
            let actions = ids
                .iter()
                .map(|&id| AgentActionRecord::new(id, DataContainer::discrete(step % ACTION_COUNT)))
                .collect();
            transport = transport.with_actions(actions);
        }
        let transport = transport.with_raw("ignored flush reply");

        let mut ctx = SimContext::new(self.config.seed);
        let mut env = self.probe_env(&ctx);
        let mut session = self.scripted_session(transport)?;
        let summary = EpisodeRunner::from_config(&self.config).run(&mut session, &mut env, &mut ctx)?;

        ensure(summary.steps == expected, || {
            format!("{} steps, expected {}", summary.steps, expected)
        })?;
        ensure(session.state() == SessionState::Closed, || {
            format!("state {}", session.state())
        })?;

        let script = session.transport();
        let states = script.sent_states().len() as u64;
        ensure(states == expected + 1, || format!("{} state batches", states))?;
        ensure(script.remaining_replies() == 0, || {
            format!("{} replies unused", script.remaining_replies())
        })?;
        ensure(
            summary.applied == ids.len() * expected as usize,
            || format!("{} actions applied", summary.applied),
        )?;

        Ok(ScenarioStats {
            steps: summary.steps,
            messages: script.sent().len(),
            sim_time: summary.sim_time,
        })
    }

    /// End before the first step: no connection, no message.
    fn run_early_simulation_end(&self) -> Result<ScenarioStats, ScenarioError> {
        let ctx = SimContext::new(self.config.seed);
        let mut env = self.probe_env(&ctx);
        let mut session = self.scripted_session(ScriptedTransport::new())?;

        let outcome = session.notify_simulation_end(&mut env)?;
        ensure(outcome == StepOutcome::Closed, || format!("end returned {:?}", outcome))?;
        ensure(session.transport().sent().is_empty(), || "message sent".to_string())?;
        ensure(session.transport().endpoint().is_none(), || {
            "transport connected".to_string()
        })?;
        ensure(
            session.step(&mut env).is_err_and(|e| e.is_usage_error()),
            || "closed session accepted a step".to_string(),
        )?;

        Ok(ScenarioStats::default())
    }

    /// Peer declines in its init ack.
    fn run_init_declined(&self) -> Result<ScenarioStats, ScenarioError> {
        let ctx = SimContext::new(self.config.seed);
        let mut env = self.probe_env(&ctx);
        let mut session = self.scripted_session(ScriptedTransport::new().with_ack(true))?;

        let outcome = session.step(&mut env)?;
        ensure(outcome == StepOutcome::PeerStopRequested, || {
            format!("first step returned {:?}", outcome)
        })?;
        ensure(session.state() == SessionState::PeerStopRequested, || {
            format!("state {}", session.state())
        })?;
        let messages = session.transport().sent().len();
        ensure(messages == 1, || format!("{} messages sent", messages))?;

        Ok(ScenarioStats {
            messages,
            ..Default::default()
        })
    }

    /// Random peer on its own thread over a loopback pair.
    fn run_random_agent(&self) -> Result<ScenarioStats, ScenarioError> {
        let ids = self.agent_ids()?;
        let mut ctx = SimContext::new(self.config.seed);
        let session_config = self.config.session_config().with_action_validation(true);
        let endpoint = session_config.endpoint();

        let (sim_end, agent_end) = LoopbackTransport::pair();
        let peer_seed = ctx.derive_seed(PEER_STREAM);
        let handle =
            std::thread::spawn(move || run_random_peer(agent_end, &endpoint, peer_seed, None));

        let mut env = self.probe_env(&ctx);
        let mut session = Session::new(session_config, sim_end);
        for &id in &ids {
            session.register_agent(id)?;
        }
        let summary = EpisodeRunner::from_config(&self.config).run(&mut session, &mut env, &mut ctx);

        // Closing the channel ends the peer loop
        drop(session);
        let peer_states = handle
            .join()
            .map_err(|_| ScenarioError::Peer("peer thread panicked".to_string()))?
            .map_err(|e| ScenarioError::Peer(e.to_string()))?;
        let summary = summary?;

        let expected = self.config.expected_steps();
        ensure(summary.steps == expected, || {
            format!("{} steps, expected {}", summary.steps, expected)
        })?;
        ensure(peer_states == expected + 1, || {
            format!("peer saw {} states", peer_states)
        })?;
        ensure(env.executed().len() == ids.len() * expected as usize, || {
            format!("{} actions executed", env.executed().len())
        })?;
        ensure(
            env.executed()
                .iter()
                .all(|(_, a)| a.as_discrete().is_some_and(|v| v < ACTION_COUNT)),
            || "action outside the declared space".to_string(),
        )?;

        Ok(ScenarioStats {
            steps: summary.steps,
            messages: expected as usize + 2,
            sim_time: summary.sim_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42, 3)
            .with_duration(1.0)
            .with_step_time(0.25);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
        }
    }

    #[test]
    fn test_single_agent() {
        let runner = ScenarioRunner::new(7, 1).with_duration(0.5).with_step_time(0.1);
        for scenario in ScenarioId::all() {
            assert!(runner.run(scenario).passed, "{} failed", scenario);
        }
    }

    #[test]
    fn test_zero_agents_fail_cleanly() {
        let runner = ScenarioRunner::new(1, 0);
        let result = runner.run(ScenarioId::Handshake);
        assert!(!result.passed);
        assert!(result.failure_reason.is_some());
    }

    #[test]
    fn test_simulation_end_reports_time() {
        let runner = ScenarioRunner::new(42, 2).with_duration(1.0).with_step_time(0.3);
        let result = runner.run(ScenarioId::SimulationEnd);
        assert!(result.passed);
        assert_eq!(result.steps, 4);
        approx::assert_relative_eq!(result.final_time_secs, 1.2, epsilon = 1e-9);
    }
}
