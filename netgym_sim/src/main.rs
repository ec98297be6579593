//! netgym Simulator CLI
//!
//! Runs the deterministic protocol scenarios, or with `--connect` drives the
//! probe environment against an external agent process.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use netgym_core::{Session, SessionConfig};
use netgym_env::{TcpTransport, Transport};
use netgym_sim::scenarios::ScenarioId;
use netgym_sim::{EpisodeRunner, ProbeEnv, ScenarioResult, ScenarioRunner, SimConfig, SimContext};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Zmq,
    Tcp,
}

/// netgym bridge simulator
#[derive(Parser, Debug)]
#[command(name = "netgym-sim")]
#[command(about = "Run deterministic bridge scenarios or drive an external agent", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of agents
    #[arg(short, long, default_value = "2")]
    agents: usize,

    /// Scenario to run (handshake, sparse_actions, peer_stop, ..., all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Simulated time per episode in seconds
    #[arg(long, default_value = "5.0")]
    sim_time: f64,

    /// Simulated time between steps in seconds
    #[arg(long, default_value = "0.5")]
    step_time: f64,

    /// Connect to an agent process on this port instead of running scenarios
    #[arg(long)]
    connect: Option<u16>,

    /// Transport used with --connect
    #[arg(long, value_enum, default_value = "zmq")]
    transport: TransportKind,

    /// Session config file (JSON) used with --connect
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if let Some(port) = args.connect {
        return run_connected(&args, seed, port);
    }

    if !args.json {
        info!("netgym Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(1);
            }
        }
    };

    let runner = ScenarioRunner::new(seed, args.agents)
        .with_duration(args.sim_time)
        .with_step_time(args.step_time);

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in &scenarios {
        let result = runner.run(*scenario);

        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        results.push(result);
    }

    let total = results.len();
    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "steps": r.steps,
                    "messages": r.messages,
                    "time_secs": r.final_time_secs,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Runs one episode of the probe environment against an external peer.
fn run_connected(args: &Args, seed: u64, port: u16) -> anyhow::Result<()> {
    let sim_config = SimConfig {
        seed,
        num_agents: args.agents,
        sim_time_ms: (args.sim_time * 1000.0).round() as u64,
        step_time_ms: (args.step_time * 1000.0).round() as u64,
    };

    let session_config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    }
    .apply_env_overrides()?
    .with_port(port)
    .with_step_interval(sim_config.step_time());

    let transport: Box<dyn Transport> = match args.transport {
        TransportKind::Tcp => Box::new(TcpTransport::requester()),
        #[cfg(feature = "zmq")]
        TransportKind::Zmq => Box::new(netgym_env::ZmqTransport::requester()?),
        #[cfg(not(feature = "zmq"))]
        TransportKind::Zmq => anyhow::bail!("Built without ZeroMQ support; use --transport tcp"),
    };

    info!(
        "Driving {} agents against {} for {:.1}s",
        sim_config.num_agents,
        session_config.endpoint(),
        args.sim_time
    );

    let mut ctx = SimContext::new(seed);
    let mut env = ProbeEnv::new(ctx.derive_rng(1));
    let mut session = Session::new(session_config, transport);
    for id in 0..sim_config.num_agents as u32 {
        session.register_agent(id)?;
    }

    let summary = EpisodeRunner::from_config(&sim_config).run(&mut session, &mut env, &mut ctx)?;

    if args.json {
        let out = serde_json::json!({
            "session": session.id().to_string(),
            "steps": summary.steps,
            "applied": summary.applied,
            "rejected": summary.rejected,
            "peer_stopped": summary.peer_stopped,
            "time_secs": summary.sim_time.as_secs_f64(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        info!(
            "Done: {} steps, {} actions applied, {} rejected{}",
            summary.steps,
            summary.applied,
            summary.rejected,
            if summary.peer_stopped { " (stopped by peer)" } else { "" }
        );
    }
    Ok(())
}
