//! Single-threaded scripted peer for deterministic scenario tests.
//!
//! Replies are queued up front; every message the session sends is recorded
//! for later inspection. Running out of replies looks like a closed peer.

use netgym_core::codec::{self, MultiAgentAct, MultiAgentInit, MultiAgentState, SimInitAck, WireMessage};
use netgym_env::{AgentActionRecord, Alternation, Endpoint, Role, Transport, TransportError};
use std::collections::VecDeque;

/// One queued reply.
#[derive(Debug, Clone)]
enum Reply {
    Message(WireMessage),
    Raw(Vec<u8>),
}

#[derive(Debug)]
pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    sent: Vec<Vec<u8>>,
    guard: Alternation,
    endpoint: Option<Endpoint>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            sent: Vec::new(),
            guard: Alternation::new(Role::Request),
            endpoint: None,
        }
    }

    /// Queues an init acknowledgement.
    pub fn with_ack(mut self, stop_sim_requested: bool) -> Self {
        self.replies.push_back(Reply::Message(WireMessage::SimInitAck(SimInitAck {
            done: true,
            stop_sim_requested,
        })));
        self
    }

    /// Queues an action reply.
    pub fn with_actions(mut self, actions: Vec<AgentActionRecord>) -> Self {
        self.replies
            .push_back(Reply::Message(WireMessage::MultiAgentAct(MultiAgentAct::with_actions(actions))));
        self
    }

    /// Queues `count` empty action replies.
    pub fn with_empty_actions(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.with_actions(Vec::new());
        }
        self
    }

    /// Queues a stop request that also carries actions, which must be ignored.
    pub fn with_stop(mut self, actions: Vec<AgentActionRecord>) -> Self {
        self.replies.push_back(Reply::Message(WireMessage::MultiAgentAct(MultiAgentAct {
            stop_sim_requested: true,
            actions,
        })));
        self
    }

    /// Queues raw bytes, valid or not.
    pub fn with_raw(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.replies.push_back(Reply::Raw(bytes.into()));
        self
    }

    /// Every message the session sent, in order.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// The init message, if one was sent first.
    pub fn sent_init(&self) -> Option<MultiAgentInit> {
        self.sent.first().and_then(|m| codec::decode_init(m).ok())
    }

    /// All state batches sent (steps and the final flush).
    pub fn sent_states(&self) -> Vec<MultiAgentState> {
        self.sent
            .iter()
            .filter_map(|m| codec::decode_state(m).ok())
            .collect()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.len()
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        if let Some(existing) = &self.endpoint {
            return Err(TransportError::AlreadyConnected(existing.to_string()));
        }
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.guard.begin_send()?;
        self.sent.push(payload.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.guard.begin_receive()?;
        match self.replies.pop_front() {
            Some(Reply::Raw(bytes)) => Ok(bytes),
            Some(Reply::Message(message)) => {
                codec::encode(&message).map_err(|e| TransportError::receive(e.to_string()))
            }
            None => Err(TransportError::PeerClosed),
        }
    }

    fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netgym_env::DataContainer;

    #[test]
    fn test_replays_in_order() {
        let mut transport = ScriptedTransport::new()
            .with_ack(false)
            .with_actions(vec![AgentActionRecord::new(1u32, DataContainer::discrete(2))])
            .with_raw("garbage");
        transport.connect(&Endpoint::localhost(5555)).unwrap();

        let ack = codec::decode_init_ack(&transport.round_trip(b"a").unwrap()).unwrap();
        assert!(!ack.stop_sim_requested);

        let act = codec::decode_act(&transport.round_trip(b"b").unwrap()).unwrap();
        assert_eq!(act.actions.len(), 1);

        assert_eq!(transport.round_trip(b"c").unwrap(), b"garbage");
        assert!(matches!(
            transport.round_trip(b"d"),
            Err(TransportError::PeerClosed)
        ));
        assert_eq!(transport.sent().len(), 4);
    }

    #[test]
    fn test_enforces_alternation() {
        let mut transport = ScriptedTransport::new().with_ack(false);
        transport.connect(&Endpoint::localhost(5555)).unwrap();
        assert!(matches!(
            transport.receive(),
            Err(TransportError::OutOfSequence { .. })
        ));
    }
}
