//! Per-agent environment capability trait.

use crate::types::{AgentId, DataContainer, SpaceDescriptor};

/// The callback surface the bridge uses to read agent state and apply actions.
///
/// Implemented directly by the simulation-specific environment type. Every
/// method is called synchronously from inside a session step and must not try
/// to drive the session itself.
///
/// # Call Order
///
/// - Init: `observation_space`, `action_space` once per agent, registry order
/// - Step: `observation`, `reward`, `done`, `info` per agent, registry order,
///   then `execute_action` for every action the peer sent
///
/// Getters take `&mut self` because simulations commonly update counters or
/// draw randomness while producing observations.
pub trait EnvironmentAdapter {
    /// Describes the observations this agent produces.
    ///
    /// `None` omits the descriptor from the init message.
    fn observation_space(&mut self, agent: AgentId) -> Option<SpaceDescriptor>;

    /// Describes the actions this agent accepts.
    fn action_space(&mut self, agent: AgentId) -> Option<SpaceDescriptor>;

    /// Collects the current observation for this agent.
    fn observation(&mut self, agent: AgentId) -> Option<DataContainer>;

    /// Reward earned since the previous step.
    fn reward(&mut self, _agent: AgentId) -> f32 {
        0.0
    }

    /// Advisory per-agent termination flag. Never ends the session by itself.
    fn done(&mut self, _agent: AgentId) -> bool {
        false
    }

    /// Free-form auxiliary information.
    fn info(&mut self, _agent: AgentId) -> String {
        String::new()
    }

    /// Applies an action chosen by the peer.
    ///
    /// # Returns
    /// `true` if the action was accepted. A `false` is reported to the caller
    /// of the step but does not abort it.
    fn execute_action(&mut self, agent: AgentId, action: DataContainer) -> bool;
}

impl<E: EnvironmentAdapter + ?Sized> EnvironmentAdapter for Box<E> {
    fn observation_space(&mut self, agent: AgentId) -> Option<SpaceDescriptor> {
        (**self).observation_space(agent)
    }

    fn action_space(&mut self, agent: AgentId) -> Option<SpaceDescriptor> {
        (**self).action_space(agent)
    }

    fn observation(&mut self, agent: AgentId) -> Option<DataContainer> {
        (**self).observation(agent)
    }

    fn reward(&mut self, agent: AgentId) -> f32 {
        (**self).reward(agent)
    }

    fn done(&mut self, agent: AgentId) -> bool {
        (**self).done(agent)
    }

    fn info(&mut self, agent: AgentId) -> String {
        (**self).info(agent)
    }

    fn execute_action(&mut self, agent: AgentId, action: DataContainer) -> bool {
        (**self).execute_action(agent, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    impl EnvironmentAdapter for Minimal {
        fn observation_space(&mut self, _agent: AgentId) -> Option<SpaceDescriptor> {
            None
        }

        fn action_space(&mut self, _agent: AgentId) -> Option<SpaceDescriptor> {
            Some(SpaceDescriptor::discrete(2))
        }

        fn observation(&mut self, _agent: AgentId) -> Option<DataContainer> {
            None
        }

        fn execute_action(&mut self, _agent: AgentId, action: DataContainer) -> bool {
            action.as_discrete().is_some()
        }
    }

    #[test]
    fn test_unbound_defaults() {
        let mut env = Minimal;
        assert_eq!(env.reward(AgentId(1)), 0.0);
        assert!(!env.done(AgentId(1)));
        assert!(env.info(AgentId(1)).is_empty());
    }

    #[test]
    fn test_boxed_adapter_forwards() {
        let mut env: Box<dyn EnvironmentAdapter> = Box::new(Minimal);
        assert_eq!(env.action_space(AgentId(3)), Some(SpaceDescriptor::discrete(2)));
        assert!(env.execute_action(AgentId(3), DataContainer::discrete(1)));
        assert!(!env.execute_action(AgentId(3), DataContainer::tuple(vec![])));
    }
}
