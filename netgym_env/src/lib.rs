//! netgym Environment Abstraction Layer
//!
//! This crate holds the seams between the bridge and the outside world:
//! - **Transport**: the strictly alternating request/reply channel to the
//!   external agent process (`Transport`, ZeroMQ and TCP implementations)
//! - **Adapter**: the per-agent callback surface the simulation implements
//!   (`EnvironmentAdapter`)
//! - **Spaces**: space descriptors and data containers carried on the wire
//!
//! # Example
//!
//! ```ignore
//! use netgym_env::{Endpoint, Transport, ZmqTransport};
//!
//! let mut transport = ZmqTransport::requester()?;
//! transport.connect(&Endpoint::localhost(5555))?;
//! let reply = transport.round_trip(&request_bytes)?;
//! ```

mod adapter;
mod error;
mod spaces;
mod tcp_impl;
mod transport;
mod types;
#[cfg(feature = "zmq")]
mod zmq_impl;

pub use adapter::EnvironmentAdapter;
pub use error::TransportError;
pub use tcp_impl::{read_frame, write_frame, TcpTransport, MAX_FRAME_SIZE};
pub use transport::{Alternation, Endpoint, Role, SharedTransport, Transport};
pub use types::{
    AgentActionRecord, AgentId, AgentInitRecord, AgentStateRecord, BoxData, DataContainer, Dtype,
    NamedData, NamedSpace, SpaceDescriptor,
};
#[cfg(feature = "zmq")]
pub use zmq_impl::ZmqTransport;
