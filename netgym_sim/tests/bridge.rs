//! End-to-end bridge tests: session against scripted, threaded and TCP peers.

use netgym_core::{BridgeError, PeerBridge, Session, SessionConfig, SessionState, StepOutcome};
use netgym_env::{
    AgentActionRecord, AgentId, BoxData, DataContainer, Dtype, Endpoint, EnvironmentAdapter,
    SpaceDescriptor, TcpTransport, Transport, TransportError,
};
use netgym_sim::scenarios::ScenarioId;
use netgym_sim::{
    run_random_peer, EpisodeRunner, LoopbackTransport, ProbeEnv, ScenarioRunner,
    ScriptedTransport, SimConfig, SimContext,
};
use std::time::Duration;

fn small_config(seed: u64) -> SimConfig {
    SimConfig {
        seed,
        num_agents: 3,
        sim_time_ms: 1_000,
        step_time_ms: 100,
    }
}

#[test]
fn test_scenarios_across_seeds() {
    for seed in [1, 42, 9_999] {
        let runner = ScenarioRunner::from_config(small_config(seed));
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} seed={} failed: {:?}",
                scenario, seed, result.failure_reason
            );
        }
    }
}

#[test]
fn test_scripted_episode_is_deterministic() {
    let run = |seed: u64| {
        let config = small_config(seed);
        let mut ctx = SimContext::new(seed);
        let mut env = ProbeEnv::new(ctx.derive_rng(1));
        let transport = ScriptedTransport::new()
            .with_ack(false)
            .with_empty_actions(config.expected_steps() as usize + 1);
        let mut session = Session::new(config.session_config(), transport);
        for id in 0..3u32 {
            session.register_agent(id).unwrap();
        }
        EpisodeRunner::from_config(&config)
            .run(&mut session, &mut env, &mut ctx)
            .unwrap();
        session.into_transport().sent_states()
    };

    let a = run(5);
    let b = run(5);
    assert_eq!(a.len(), 11);
    assert_eq!(a, b);
}

#[test]
fn test_state_batches_follow_registration_order() {
    let config = small_config(3);
    let mut ctx = SimContext::new(3);
    let mut env = ProbeEnv::new(ctx.derive_rng(1));
    let transport = ScriptedTransport::new().with_ack(false).with_empty_actions(11);

    let mut session = Session::new(config.session_config(), transport);
    for id in [30u32, 10, 20] {
        session.register_agent(id).unwrap();
    }
    EpisodeRunner::from_config(&config)
        .run(&mut session, &mut env, &mut ctx)
        .unwrap();

    for batch in session.transport().sent_states() {
        let ids: Vec<u32> = batch.agents.iter().map(|a| a.agent_id.0).collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }
}

#[test]
fn test_loopback_peer_requests_stop() {
    let config = small_config(11);
    let mut ctx = SimContext::new(11);
    let session_config = config.session_config().with_action_validation(true);
    let endpoint = session_config.endpoint();

    let (sim_end, agent_end) = LoopbackTransport::pair();
    let peer =
        std::thread::spawn(move || run_random_peer(agent_end, &endpoint, 77, Some(4)));

    let mut env = ProbeEnv::new(ctx.derive_rng(1));
    let mut session = Session::new(session_config, sim_end);
    for id in 0..3u32 {
        session.register_agent(id).unwrap();
    }
    let summary = EpisodeRunner::from_config(&config)
        .run(&mut session, &mut env, &mut ctx)
        .unwrap();

    assert!(summary.peer_stopped);
    assert_eq!(summary.steps, 3);
    assert_eq!(env.executed().len(), 9);
    assert_eq!(session.state(), SessionState::PeerStopRequested);
    assert_eq!(
        session.notify_simulation_end(&mut env).unwrap(),
        StepOutcome::PeerStopRequested
    );

    drop(session);
    assert_eq!(peer.join().unwrap().unwrap(), 4);
}

#[test]
fn test_loopback_manual_peer() {
    let (sim_end, agent_end) = LoopbackTransport::pair();
    let endpoint = Endpoint::localhost(5555);

    let peer_endpoint = endpoint.clone();
    let peer = std::thread::spawn(move || -> Result<Vec<u32>, BridgeError> {
        let mut peer = PeerBridge::new(agent_end);
        peer.bind(&peer_endpoint)?;
        peer.initialize()?;

        let mut seen = Vec::new();
        let state = peer.receive_state()?;
        seen.push(state.agents.len() as u32);

        // Act for agent 2 only
        let state = peer.step(vec![AgentActionRecord::new(2u32, DataContainer::discrete(4))])?;
        seen.push(state.agents.len() as u32);
        peer.send_actions(Vec::new())?;
        Ok(seen)
    });

    let mut ctx = SimContext::new(8);
    let mut env = ProbeEnv::new(ctx.derive_rng(1));
    let mut session = Session::new(SessionConfig::default(), sim_end);
    session.register_agent(1u32).unwrap();
    session.register_agent(2u32).unwrap();

    assert!(session.step(&mut env).unwrap().is_continue());
    ctx.advance_time(Duration::from_millis(100));
    assert_eq!(
        session.notify_simulation_end(&mut env).unwrap(),
        StepOutcome::Closed
    );

    assert_eq!(env.executed(), [(AgentId(2), DataContainer::discrete(4))]);
    drop(session);
    assert_eq!(peer.join().unwrap().unwrap(), vec![2, 2]);
}

#[test]
fn test_tcp_round_trip() {
    let endpoint = Endpoint::new("127.0.0.1", 47_701);
    let peer_endpoint = endpoint.clone();
    let peer = std::thread::spawn(move || {
        run_random_peer(TcpTransport::replier(), &peer_endpoint, 5, None)
    });

    // The peer binds on its own thread; retry until it accepts
    let mut transport = TcpTransport::requester();
    let mut attempts = 0;
    while let Err(e) = transport.connect(&endpoint) {
        attempts += 1;
        assert!(attempts < 100, "peer never started listening: {}", e);
        std::thread::sleep(Duration::from_millis(20));
    }

    let config = SimConfig {
        seed: 5,
        num_agents: 2,
        sim_time_ms: 500,
        step_time_ms: 100,
    };
    let mut ctx = SimContext::new(5);
    let mut env = ProbeEnv::new(ctx.derive_rng(1));
    let mut session = Session::new(config.session_config(), transport);
    session.register_agent(0u32).unwrap();
    session.register_agent(1u32).unwrap();

    let summary = EpisodeRunner::from_config(&config)
        .run(&mut session, &mut env, &mut ctx)
        .unwrap();
    assert_eq!(summary.steps, 5);
    assert_eq!(summary.applied, 10);
    assert_eq!(session.state(), SessionState::Closed);

    drop(session);
    assert_eq!(peer.join().unwrap().unwrap(), 6);
}

#[test]
fn test_dropped_peer_fails_session() {
    let (sim_end, agent_end) = LoopbackTransport::pair();
    drop(agent_end);

    let mut env = ProbeEnv::new(SimContext::new(1).derive_rng(1));
    let mut session = Session::new(SessionConfig::default(), sim_end);
    session.register_agent(1u32).unwrap();

    let err = session.step(&mut env).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Transport(TransportError::PeerClosed)
    ));
    assert_eq!(session.state(), SessionState::Failed);
}

/// Host with unbounded and extreme box spaces.
#[derive(Default)]
struct UnboundedEnv {
    executed: Vec<(AgentId, DataContainer)>,
}

impl UnboundedEnv {
    fn space(agent: AgentId) -> SpaceDescriptor {
        if agent.0 == 0 {
            SpaceDescriptor::bounded_box(f64::NEG_INFINITY, f64::INFINITY, vec![3], Dtype::Float)
        } else {
            SpaceDescriptor::tuple(vec![
                SpaceDescriptor::bounded_box(0.0, f64::INFINITY, vec![2], Dtype::Double),
                SpaceDescriptor::bounded_box(-1e39, 1e39, vec![1], Dtype::Float),
            ])
        }
    }
}

impl EnvironmentAdapter for UnboundedEnv {
    fn observation_space(&mut self, _agent: AgentId) -> Option<SpaceDescriptor> {
        Some(SpaceDescriptor::bounded_box(f64::NEG_INFINITY, f64::INFINITY, vec![1], Dtype::Double))
    }

    fn action_space(&mut self, agent: AgentId) -> Option<SpaceDescriptor> {
        Some(Self::space(agent))
    }

    fn observation(&mut self, _agent: AgentId) -> Option<DataContainer> {
        Some(DataContainer::boxed(None, BoxData::Double(vec![-1e300])))
    }

    fn execute_action(&mut self, agent: AgentId, action: DataContainer) -> bool {
        self.executed.push((agent, action));
        true
    }
}

#[test]
fn test_unbounded_spaces_with_random_peer() {
    let session_config = SessionConfig::default().with_action_validation(true);
    let endpoint = session_config.endpoint();

    let (sim_end, agent_end) = LoopbackTransport::pair();
    let peer = std::thread::spawn(move || run_random_peer(agent_end, &endpoint, 21, None));

    let mut env = UnboundedEnv::default();
    let mut session = Session::new(session_config, sim_end);
    session.register_agent(0u32).unwrap();
    session.register_agent(1u32).unwrap();

    for _ in 0..3 {
        assert!(session.step(&mut env).unwrap().is_continue());
    }
    assert_eq!(
        session.notify_simulation_end(&mut env).unwrap(),
        StepOutcome::Closed
    );

    assert_eq!(env.executed.len(), 6);
    for (agent, action) in &env.executed {
        assert!(action.is_finite());
        assert!(UnboundedEnv::space(*agent).contains(action));
    }

    drop(session);
    assert_eq!(peer.join().unwrap().unwrap(), 4);
}
