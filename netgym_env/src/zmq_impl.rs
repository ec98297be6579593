//! Production transport backed by ZeroMQ REQ/REP sockets.
//!
//! The simulation side opens a REQ socket and connects to
//! `tcp://<host>:<port>`; the agent side opens a REP socket bound on
//! `tcp://*:<port>`. ZeroMQ frames every message, so payloads travel as-is.

use crate::error::TransportError;
use crate::transport::{Alternation, Endpoint, Role, Transport};
use tracing::debug;

/// ZeroMQ transport for one peer.
pub struct ZmqTransport {
    socket: zmq::Socket,
    _context: zmq::Context,
    role: Role,
    guard: Alternation,
    endpoint: Option<Endpoint>,
}

impl ZmqTransport {
    /// Creates an unconnected transport for the given role.
    pub fn new(role: Role) -> Result<Self, TransportError> {
        let context = zmq::Context::new();
        let kind = match role {
            Role::Request => zmq::REQ,
            Role::Reply => zmq::REP,
        };
        let socket = context
            .socket(kind)
            .map_err(|e| TransportError::connect("zmq", e))?;

        // Do not keep unsent messages around after drop
        socket
            .set_linger(0)
            .map_err(|e| TransportError::connect("zmq", e))?;

        Ok(Self {
            socket,
            _context: context,
            role,
            guard: Alternation::new(role),
            endpoint: None,
        })
    }

    /// Simulation side transport.
    pub fn requester() -> Result<Self, TransportError> {
        Self::new(Role::Request)
    }

    /// Agent side transport.
    pub fn replier() -> Result<Self, TransportError> {
        Self::new(Role::Reply)
    }

    /// Returns the endpoint this transport is connected or bound to.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }
}

impl Transport for ZmqTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        if let Some(existing) = &self.endpoint {
            return Err(TransportError::AlreadyConnected(existing.to_string()));
        }

        match self.role {
            Role::Request => {
                let address = endpoint.to_string();
                self.socket
                    .connect(&address)
                    .map_err(|e| TransportError::connect(&address, e))?;
                debug!("ZMQ REQ connected to {}", address);
            }
            Role::Reply => {
                let address = format!("tcp://*:{}", endpoint.port);
                self.socket
                    .bind(&address)
                    .map_err(|e| TransportError::connect(&address, e))?;
                debug!("ZMQ REP bound on {}", address);
            }
        }

        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.guard.begin_send()?;
        self.socket
            .send(payload, 0)
            .map_err(|e| TransportError::send(e.to_string()))
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.guard.begin_receive()?;
        self.socket.recv_bytes(0).map_err(|e| match e {
            zmq::Error::ETERM => TransportError::PeerClosed,
            other => TransportError::receive(other.to_string()),
        })
    }

    fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_before_connect() {
        let mut transport = ZmqTransport::requester().unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send(b"hello"),
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn test_req_rep_round_trip() {
        // Port chosen away from the default 5555 to avoid clashing with a live agent
        let endpoint = Endpoint::new("127.0.0.1", 47_655);

        let mut server = ZmqTransport::replier().unwrap();
        server.connect(&endpoint).unwrap();

        let handle = std::thread::spawn(move || {
            let request = server.receive().unwrap();
            let mut reply = request.clone();
            reply.reverse();
            server.send(&reply).unwrap();
        });

        let mut client = ZmqTransport::requester().unwrap();
        client.connect(&endpoint).unwrap();
        let reply = client.round_trip(b"abc").unwrap();
        assert_eq!(reply, b"cba");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_twice() {
        let mut client = ZmqTransport::requester().unwrap();
        client.connect(&Endpoint::new("127.0.0.1", 47_656)).unwrap();
        assert!(matches!(
            client.connect(&Endpoint::new("127.0.0.1", 47_656)),
            Err(TransportError::AlreadyConnected(_))
        ));
    }
}
