//! netgym Deterministic Simulation Harness
//!
//! Runs the bridge against scripted and in-process peers with every source
//! of non-determinism controlled:
//! - **Time**: virtual clock advanced by the episode loop, never the wall clock
//! - **Peer**: scripted replies, or a random peer on a loopback channel
//! - **Randomness**: all entropy derived from a single 64-bit seed
//!
//! # Usage
//!
//! ```ignore
//! use netgym_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 3).with_duration(5.0);
//! let result = runner.run(ScenarioId::PeerStop);
//! assert!(result.passed);
//! ```

mod context;
pub mod demo;
mod episode;
mod loopback;
mod runner;
pub mod scenarios;
mod script;

pub use context::SimContext;
pub use demo::{run_random_peer, ProbeEnv};
pub use episode::{EpisodeRunner, EpisodeSummary, SimConfig};
pub use loopback::LoopbackTransport;
pub use runner::{ScenarioError, ScenarioResult, ScenarioRunner};
pub use script::ScriptedTransport;
