//! Plain TCP transport with length-prefixed frames.
//!
//! Every message on the wire is a 4-byte **little-endian** `u32` length
//! prefix followed by that many payload bytes.
//!
//! ```text
//! +----------------+------------------+
//! | Length (4B LE) | Payload          |
//! +----------------+------------------+
//! ```

use crate::error::TransportError;
use crate::transport::{Alternation, Endpoint, Role, Transport};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use tracing::debug;

/// Largest frame accepted in either direction (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// TCP transport for one peer.
///
/// The Request role connects; the Reply role binds and accepts exactly one
/// connection inside `connect`.
pub struct TcpTransport {
    role: Role,
    stream: Option<TcpStream>,
    guard: Alternation,
    endpoint: Option<Endpoint>,
}

impl TcpTransport {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            stream: None,
            guard: Alternation::new(role),
            endpoint: None,
        }
    }

    pub fn requester() -> Self {
        Self::new(Role::Request)
    }

    pub fn replier() -> Self {
        Self::new(Role::Reply)
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

/// Writes one length-prefixed frame and flushes.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let len = (payload.len() as u32).to_le_bytes();
    writer
        .write_all(&len)
        .and_then(|_| writer.write_all(payload))
        .and_then(|_| writer.flush())
        .map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                TransportError::PeerClosed
            }
            _ => TransportError::send(e.to_string()),
        })
}

/// Reads one length-prefixed frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).map_err(read_error)?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(read_error)?;
    Ok(payload)
}

fn read_error(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            TransportError::PeerClosed
        }
        _ => TransportError::receive(e.to_string()),
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        if let Some(existing) = &self.endpoint {
            return Err(TransportError::AlreadyConnected(existing.to_string()));
        }

        let stream = match self.role {
            Role::Request => TcpStream::connect((endpoint.host.as_str(), endpoint.port))
                .map_err(|e| TransportError::connect(endpoint, e))?,
            Role::Reply => {
                let listener = TcpListener::bind(("0.0.0.0", endpoint.port))
                    .map_err(|e| TransportError::connect(endpoint, e))?;
                debug!("TCP listening on port {}", endpoint.port);
                let (stream, peer) = listener
                    .accept()
                    .map_err(|e| TransportError::connect(endpoint, e))?;
                debug!("TCP accepted peer {}", peer);
                stream
            }
        };

        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::connect(endpoint, e))?;

        self.stream = Some(stream);
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.stream()?;
        self.guard.begin_send()?;
        write_frame(self.stream()?, payload)
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        self.stream()?;
        self.guard.begin_receive()?;
        read_frame(self.stream()?)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
