//! Host-side episode loop.
//!
//! Plays the role of the discrete-event scheduler: a step fires at virtual
//! time zero and then every `step_time` until `sim_time` is reached, after
//! which the simulation end is announced.

use crate::context::SimContext;
use netgym_core::{BridgeError, Session, SessionConfig, StepOutcome};
use netgym_env::{EnvironmentAdapter, Transport};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for a harness run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of agents to register
    pub num_agents: usize,

    /// Total simulated time in milliseconds
    pub sim_time_ms: u64,

    /// Simulated time between steps in milliseconds
    pub step_time_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_agents: 2,
            sim_time_ms: 5_000,
            step_time_ms: 500,
        }
    }
}

impl SimConfig {
    pub fn sim_time(&self) -> Duration {
        Duration::from_millis(self.sim_time_ms)
    }

    pub fn step_time(&self) -> Duration {
        Duration::from_millis(self.step_time_ms)
    }

    /// Steps fired before `sim_time` if the peer never stops early.
    pub fn expected_steps(&self) -> u64 {
        if self.step_time_ms == 0 {
            return 0;
        }
        self.sim_time_ms.div_ceil(self.step_time_ms)
    }

    /// Session config carrying this run's step interval.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_name(format!("sim-{}", self.seed))
            .with_step_interval(self.step_time())
    }
}

/// What happened during one episode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeSummary {
    /// Steps completed with actions applied
    pub steps: u64,

    /// Actions the adapter accepted
    pub applied: usize,

    /// Actions the adapter refused
    pub rejected: usize,

    /// The peer ended the episode
    pub peer_stopped: bool,

    /// Virtual time when the episode ended
    pub sim_time: Duration,
}

pub struct EpisodeRunner {
    sim_time: Duration,
    step_time: Duration,
}

impl EpisodeRunner {
    pub fn new(sim_time: Duration, step_time: Duration) -> Self {
        Self {
            sim_time,
            step_time,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.sim_time(), config.step_time())
    }

    /// Steps the session until the simulated time runs out or the peer stops.
    pub fn run<T, E>(
        &self,
        session: &mut Session<T>,
        env: &mut E,
        ctx: &mut SimContext,
    ) -> Result<EpisodeSummary, BridgeError>
    where
        T: Transport,
        E: EnvironmentAdapter + ?Sized,
    {
        let mut summary = EpisodeSummary::default();

        if !self.step_time.is_zero() {
            while ctx.now() < self.sim_time {
                match session.step(env)? {
                    StepOutcome::Continue(report) => {
                        summary.steps += 1;
                        summary.applied += report.applied;
                        summary.rejected += report.rejected.len();
                    }
                    StepOutcome::PeerStopRequested | StepOutcome::Closed => {
                        summary.peer_stopped = true;
                        break;
                    }
                }
                ctx.advance_time(self.step_time);
                debug!("t={:?} step={}", ctx.now(), summary.steps);
            }
        }

        if !summary.peer_stopped {
            session.notify_simulation_end(env)?;
        }

        summary.sim_time = ctx.now();
        info!(
            "Episode over at {:?}: {} steps, {} actions applied, peer_stopped={}",
            summary.sim_time, summary.steps, summary.applied, summary.peer_stopped
        );
        Ok(summary)
    }
}
