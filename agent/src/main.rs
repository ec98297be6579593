//! netgym Agent - Random-action Peer
//!
//! Binds the bridge port, accepts the simulation's handshake, and answers
//! every state batch with one random action per agent drawn from the
//! declared action spaces. After `--iterations` × `--steps` replies it asks
//! the simulation to stop. The protocol has no reset, so an iteration is only
//! a group of steps in the log; the run is one flat sequence of replies.
//!
//! With ZeroMQ a simulation that exits without further messages is not
//! detected; the agent then waits until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use netgym_core::{BridgeError, MultiAgentState, PeerBridge};
use netgym_env::{Endpoint, SpaceDescriptor, TcpTransport, Transport, TransportError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Zmq,
    Tcp,
}

/// Random-action agent for the netgym bridge
#[derive(Parser, Debug)]
#[command(name = "netgym-agent")]
struct Args {
    /// Port to bind
    #[arg(short, long, default_value = "5555")]
    port: u16,

    /// Number of iterations (log grouping only; nothing is reset between them)
    #[arg(short, long, default_value = "10")]
    iterations: u32,

    /// Steps per iteration; the agent replies iterations × steps times in total
    #[arg(long, default_value = "10")]
    steps: u32,

    /// Seed for action sampling
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Transport to listen on
    #[arg(long, value_enum, default_value = "zmq")]
    transport: TransportKind,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match args.transport {
        TransportKind::Tcp => run(TcpTransport::replier(), &args),
        #[cfg(feature = "zmq")]
        TransportKind::Zmq => run(netgym_env::ZmqTransport::replier()?, &args),
        #[cfg(not(feature = "zmq"))]
        TransportKind::Zmq => anyhow::bail!("Built without ZeroMQ support; use --transport tcp"),
    }
}

fn run<T: Transport>(transport: T, args: &Args) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut peer = PeerBridge::new(transport);
    peer.bind(&Endpoint::localhost(args.port))?;

    let init = peer.initialize()?;
    info!(
        "Simulation pid {} (parent {}) announced {} agents",
        init.sim_process_id,
        init.parent_process_id,
        init.agents.len()
    );
    for record in peer.agents() {
        info!(
            "{}: observation space {}, action space {}",
            record.agent_id,
            describe(&record.obs_space)?,
            describe(&record.act_space)?
        );
    }

    let mut state = peer.receive_state()?;
    log_state(0, &state);

    let mut replies = 0u64;
    'episodes: for iteration in 0..args.iterations {
        info!("Start iteration {}", iteration);
        for step in 1..=args.steps {
            let actions = peer.sample_actions(&mut rng);
            debug!("Step {}: {} actions", step, actions.len());

            match peer.step(actions) {
                Ok(next) => state = next,
                Err(BridgeError::Transport(TransportError::PeerClosed)) => {
                    info!("Simulation closed the connection");
                    break 'episodes;
                }
                Err(e) => return Err(e.into()),
            }
            replies += 1;
            log_state(step, &state);
        }
    }

    peer.close()?;
    info!("Done after {} replies", replies);
    Ok(())
}

fn describe(space: &Option<SpaceDescriptor>) -> Result<String> {
    match space {
        Some(space) => Ok(serde_json::to_string(space)?),
        None => Ok("none".to_string()),
    }
}

fn log_state(step: u32, state: &MultiAgentState) {
    let rewards: Vec<f32> = state.agents.iter().map(|a| a.reward).collect();
    let done = state.agents.iter().filter(|a| a.done).count();
    debug!("State {}: rewards {:?}, {} done", step, rewards, done);
}
