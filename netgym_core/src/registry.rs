//! Ordered set of agents participating in a session.
//!
//! Registration order is the order of every per-agent list on the wire.
//! Duplicates are kept as given; the bridge does not deduplicate.

use crate::error::UsageError;
use netgym_env::AgentId;

#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentId>,
    finalized: bool,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an agent. Fails once the registry is finalized.
    pub fn register(&mut self, agent: impl Into<AgentId>) -> Result<(), UsageError> {
        let agent = agent.into();
        if self.finalized {
            return Err(UsageError::RegistryFinalized { agent });
        }
        self.agents.push(agent);
        Ok(())
    }

    /// Freezes the registry. Fails if empty or already frozen.
    pub fn finalize(&mut self) -> Result<(), UsageError> {
        if self.finalized {
            return Err(UsageError::AlreadyFinalized);
        }
        if self.agents.is_empty() {
            return Err(UsageError::EmptyRegistry);
        }
        self.finalized = true;
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AgentId> {
        self.agents.iter()
    }

    pub fn as_slice(&self) -> &[AgentId] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.agents.contains(&agent)
    }
}

impl<'a> IntoIterator for &'a AgentRegistry {
    type Item = &'a AgentId;
    type IntoIter = std::slice::Iter<'a, AgentId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
