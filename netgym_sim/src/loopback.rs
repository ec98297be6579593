//! In-process transport pair over crossbeam channels.
//!
//! The two ends run on different threads: the simulation session on one, a
//! [`PeerBridge`](netgym_core::PeerBridge) on the other. Dropping either end
//! makes the other's next receive fail with `PeerClosed`.

use crossbeam::channel::{unbounded, Receiver, Sender};
use netgym_env::{Alternation, Endpoint, Role, Transport, TransportError};
use tracing::debug;

pub struct LoopbackTransport {
    role: Role,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    guard: Alternation,
    endpoint: Option<Endpoint>,
}

impl LoopbackTransport {
    /// Returns `(simulation end, agent end)`.
    pub fn pair() -> (Self, Self) {
        let (sim_tx, agent_rx) = unbounded();
        let (agent_tx, sim_rx) = unbounded();

        let sim = Self::new(Role::Request, sim_tx, sim_rx);
        let agent = Self::new(Role::Reply, agent_tx, agent_rx);
        (sim, agent)
    }

    fn new(role: Role, tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            role,
            tx,
            rx,
            guard: Alternation::new(role),
            endpoint: None,
        }
    }
}

impl Transport for LoopbackTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        if let Some(existing) = &self.endpoint {
            return Err(TransportError::AlreadyConnected(existing.to_string()));
        }
        debug!("Loopback {:?} end attached as {}", self.role, endpoint);
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.guard.begin_send()?;
        self.tx
            .send(payload.to_vec())
            .map_err(|_| TransportError::PeerClosed)
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.guard.begin_receive()?;
        self.rx.recv().map_err(|_| TransportError::PeerClosed)
    }

    fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }
}
