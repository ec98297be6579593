//! Transport channel abstraction between the simulation and the agent process.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Address of the peer endpoint.
///
/// A single port selects the peer; the host defaults to `localhost`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint on `localhost`.
    pub fn localhost(port: u16) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
        }
    }

    /// Creates an endpoint on an explicit host.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

/// Which side of the request/reply exchange a transport plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Simulation side: connects actively and always sends first.
    Request,
    /// Agent side: binds, receives first and replies.
    Reply,
}

/// A strictly alternating request/reply channel to exactly one peer.
///
/// # Implementations
///
/// - **Production**: `ZmqTransport` (REQ/REP sockets), `TcpTransport`
///   (length-prefixed frames)
/// - **Simulation**: in-process loopback and scripted transports in the harness
///
/// # Message Flow
///
/// ```text
/// Simulation (Request)              Agent (Reply)
///   |                                   |
///   |-- send(state batch) ------------->|-- receive()
///   |                                   |
///   |<--------------- send(actions) ----|
///   |-- receive()                       |
/// ```
///
/// # Blocking
/// `send` and `receive` block the caller. There is no timeout: a peer that
/// never replies stalls the caller indefinitely.
pub trait Transport {
    /// Connects (Request role) or binds (Reply role) to the endpoint.
    ///
    /// Only the first call may succeed; later calls return
    /// [`TransportError::AlreadyConnected`].
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Sends one complete message.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Receives one complete message, blocking until it arrives.
    fn receive(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Returns true once `connect` succeeded.
    fn is_connected(&self) -> bool;

    /// Sends a request and waits for its reply.
    fn round_trip(&mut self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.send(payload)?;
        self.receive()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        (**self).connect(endpoint)
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).receive()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn round_trip(&mut self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).round_trip(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Send,
    Receive,
}

/// Guard enforcing the send/receive alternation for a given role.
#[derive(Debug, Clone)]
pub struct Alternation {
    next: Direction,
}

impl Alternation {
    /// Request side starts by sending, reply side by receiving.
    pub fn new(role: Role) -> Self {
        let next = match role {
            Role::Request => Direction::Send,
            Role::Reply => Direction::Receive,
        };
        Self { next }
    }

    /// Checks that a send is allowed and flips to expecting a receive.
    pub fn begin_send(&mut self) -> Result<(), TransportError> {
        if self.next != Direction::Send {
            return Err(TransportError::OutOfSequence {
                expected: "receive",
                got: "send",
            });
        }
        self.next = Direction::Receive;
        Ok(())
    }

    /// Checks that a receive is allowed and flips to expecting a send.
    pub fn begin_receive(&mut self) -> Result<(), TransportError> {
        if self.next != Direction::Receive {
            return Err(TransportError::OutOfSequence {
                expected: "send",
                got: "receive",
            });
        }
        self.next = Direction::Send;
        Ok(())
    }

    /// Returns true if the next legal call is `send`.
    pub fn expects_send(&self) -> bool {
        self.next == Direction::Send
    }
}

/// Transport shared between threads.
///
/// `round_trip` holds the lock across the send and the matching receive, so
/// two callers can never interleave halves of different exchanges.
pub struct SharedTransport<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> SharedTransport<T> {
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, T>, TransportError> {
        self.inner
            .lock()
            .map_err(|_| TransportError::send("transport mutex poisoned"))
    }
}

impl<T> Clone for SharedTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Transport for SharedTransport<T> {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.lock()?.connect(endpoint)
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.lock()?.send(payload)
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        self.lock()?.receive()
    }

    fn is_connected(&self) -> bool {
        self.lock().map(|t| t.is_connected()).unwrap_or(false)
    }

    fn round_trip(&mut self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut guard = self.lock()?;
        guard.send(payload)?;
        guard.receive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes every request back, counting round trips.
    struct EchoTransport {
        connected: bool,
        pending: Option<Vec<u8>>,
        guard: Alternation,
        exchanges: usize,
    }

    impl EchoTransport {
        fn new() -> Self {
            Self {
                connected: false,
                pending: None,
                guard: Alternation::new(Role::Request),
                exchanges: 0,
            }
        }
    }

    impl Transport for EchoTransport {
        fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
            if self.connected {
                return Err(TransportError::AlreadyConnected(endpoint.to_string()));
            }
            self.connected = true;
            Ok(())
        }

        fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            self.guard.begin_send()?;
            self.pending = Some(payload.to_vec());
            Ok(())
        }

        fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
            self.guard.begin_receive()?;
            self.exchanges += 1;
            self.pending.take().ok_or(TransportError::PeerClosed)
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::localhost(5555).to_string(), "tcp://localhost:5555");
        assert_eq!(Endpoint::new("10.0.0.2", 6000).to_string(), "tcp://10.0.0.2:6000");
    }

    #[test]
    fn test_alternation_request_role() {
        let mut guard = Alternation::new(Role::Request);
        assert!(guard.expects_send());
        assert!(matches!(
            guard.begin_receive(),
            Err(TransportError::OutOfSequence { .. })
        ));
        guard.begin_send().unwrap();
        assert!(guard.begin_send().is_err());
        guard.begin_receive().unwrap();
        assert!(guard.expects_send());
    }

    #[test]
    fn test_alternation_reply_role() {
        let mut guard = Alternation::new(Role::Reply);
        assert!(!guard.expects_send());
        guard.begin_receive().unwrap();
        guard.begin_send().unwrap();
    }

    #[test]
    fn test_round_trip_default() {
        let mut transport = EchoTransport::new();
        transport.connect(&Endpoint::localhost(1)).unwrap();
        let reply = transport.round_trip(b"ping").unwrap();
        assert_eq!(reply, b"ping");
    }

    #[test]
    fn test_connect_twice_rejected() {
        let mut transport = EchoTransport::new();
        transport.connect(&Endpoint::localhost(1)).unwrap();
        assert!(matches!(
            transport.connect(&Endpoint::localhost(1)),
            Err(TransportError::AlreadyConnected(_))
        ));
    }

    #[test]
    fn test_shared_transport_threads() {
        let shared = SharedTransport::new(EchoTransport::new());
        let mut setup = shared.clone();
        setup.connect(&Endpoint::localhost(1)).unwrap();

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let mut t = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let reply = t.round_trip(&[i]).unwrap();
                        assert_eq!(reply, vec![i]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let exchanges = shared.inner.lock().unwrap().exchanges;
        assert_eq!(exchanges, 100);
    }
}
