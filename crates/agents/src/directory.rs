//! Agent persistence plus the explicit dispatch call site.
//!
//! The directory persists first and dispatches second: the lifecycle event
//! fires only after the roster write succeeded, and listener failures are
//! recorded by the dispatcher without ever failing the roster operation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::debug;

use supportflow_core::{AccountId, DomainError, DomainResult, UserId};
use supportflow_events::{Dispatcher, Event, EventKind};

use crate::agent::Agent;

/// Persistence seam for the agent roster.
///
/// The entities that originate events are external collaborators; this trait
/// is the whole interface they present to the event core.
pub trait AgentStore: Send + Sync {
    fn insert(&self, agent: Agent) -> DomainResult<()>;
    fn remove(&self, account_id: AccountId, id: UserId) -> Option<Agent>;
    fn get(&self, account_id: AccountId, id: UserId) -> Option<Agent>;
    fn list_for_account(&self, account_id: AccountId) -> Vec<Agent>;
}

impl<S> AgentStore for Arc<S>
where
    S: AgentStore + ?Sized,
{
    fn insert(&self, agent: Agent) -> DomainResult<()> {
        (**self).insert(agent)
    }

    fn remove(&self, account_id: AccountId, id: UserId) -> Option<Agent> {
        (**self).remove(account_id, id)
    }

    fn get(&self, account_id: AccountId, id: UserId) -> Option<Agent> {
        (**self).get(account_id, id)
    }

    fn list_for_account(&self, account_id: AccountId) -> Vec<Agent> {
        (**self).list_for_account(account_id)
    }
}

/// In-memory roster for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAgentRoster {
    inner: RwLock<HashMap<(AccountId, UserId), Agent>>,
}

impl InMemoryAgentRoster {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgentStore for InMemoryAgentRoster {
    fn insert(&self, agent: Agent) -> DomainResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::conflict("agent roster lock poisoned"))?;

        let key = (agent.account_id, agent.id);
        if map.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "agent {} already exists in account {}",
                agent.id, agent.account_id
            )));
        }

        map.insert(key, agent);
        Ok(())
    }

    fn remove(&self, account_id: AccountId, id: UserId) -> Option<Agent> {
        self.inner.write().ok()?.remove(&(account_id, id))
    }

    fn get(&self, account_id: AccountId, id: UserId) -> Option<Agent> {
        self.inner.read().ok()?.get(&(account_id, id)).cloned()
    }

    fn list_for_account(&self, account_id: AccountId) -> Vec<Agent> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.values()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect()
    }
}

/// The representative event producer: roster writes followed by explicit
/// dispatch.
pub struct AgentDirectory<S> {
    roster: S,
    dispatcher: Dispatcher,
}

impl<S> AgentDirectory<S>
where
    S: AgentStore,
{
    pub fn new(roster: S, dispatcher: Dispatcher) -> Self {
        Self { roster, dispatcher }
    }

    /// Persist a new agent, then dispatch `agent.added`.
    ///
    /// Dispatch happens strictly after the roster write committed; a failing
    /// downstream listener never rolls the write back or surfaces here.
    pub fn add_agent(&self, agent: Agent) -> DomainResult<Agent> {
        self.roster.insert(agent.clone())?;

        let outcome = self.dispatcher.dispatch(Event::new(
            EventKind::AgentAdded,
            Utc::now(),
            agent.event_payload(),
        ));
        debug!(
            agent = %agent.id,
            account = %agent.account_id,
            listeners = outcome.len(),
            failures = outcome.failures().count(),
            "agent.added dispatched"
        );

        Ok(agent)
    }

    /// Remove an agent from the roster, then dispatch `agent.removed`.
    pub fn remove_agent(&self, account_id: AccountId, id: UserId) -> DomainResult<Agent> {
        let agent = self
            .roster
            .remove(account_id, id)
            .ok_or_else(DomainError::not_found)?;

        let outcome = self.dispatcher.dispatch(Event::new(
            EventKind::AgentRemoved,
            Utc::now(),
            agent.event_payload(),
        ));
        debug!(
            agent = %agent.id,
            account = %agent.account_id,
            listeners = outcome.len(),
            failures = outcome.failures().count(),
            "agent.removed dispatched"
        );

        Ok(agent)
    }

    pub fn get(&self, account_id: AccountId, id: UserId) -> Option<Agent> {
        self.roster.get(account_id, id)
    }

    pub fn list_for_account(&self, account_id: AccountId) -> Vec<Agent> {
        self.roster.list_for_account(account_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;

    use supportflow_events::{Listener, ListenerError, ListenerRegistry};

    use super::*;
    use crate::agent::AgentRole;

    struct Recording {
        events: Arc<Mutex<Vec<(EventKind, Option<String>)>>>,
    }

    impl Listener for Recording {
        fn handle(&self, event: &Event) -> Result<(), ListenerError> {
            self.events.lock().unwrap().push((
                event.kind(),
                event.payload().user_str("email").map(str::to_string),
            ));
            Ok(())
        }
    }

    struct Failing;

    impl Listener for Failing {
        fn handle(&self, _event: &Event) -> Result<(), ListenerError> {
            Err(ListenerError::Other(anyhow!("downstream unavailable")))
        }
    }

    fn directory_with(
        setup: impl FnOnce(&mut ListenerRegistry),
    ) -> AgentDirectory<InMemoryAgentRoster> {
        let mut registry = ListenerRegistry::new();
        setup(&mut registry);
        AgentDirectory::new(InMemoryAgentRoster::new(), Dispatcher::new(Arc::new(registry)))
    }

    #[test]
    fn add_agent_persists_then_dispatches_agent_added() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let directory = directory_with(|registry| {
            registry
                .register(
                    EventKind::AgentAdded,
                    "recording",
                    Arc::new(Recording {
                        events: events.clone(),
                    }),
                )
                .unwrap();
        });

        let account = AccountId::new();
        let agent = directory
            .add_agent(Agent::new(account, "Jo", "jo@example.com", AgentRole::Agent).unwrap())
            .unwrap();

        assert!(directory.get(account, agent.id).is_some());
        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::AgentAdded, Some("jo@example.com".to_string()))]
        );
    }

    #[test]
    fn remove_agent_dispatches_agent_removed() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let directory = directory_with(|registry| {
            registry
                .register(
                    EventKind::AgentRemoved,
                    "recording",
                    Arc::new(Recording {
                        events: events.clone(),
                    }),
                )
                .unwrap();
        });

        let account = AccountId::new();
        let agent = directory
            .add_agent(Agent::new(account, "Jo", "jo@example.com", AgentRole::Agent).unwrap())
            .unwrap();
        directory.remove_agent(account, agent.id).unwrap();

        assert!(directory.get(account, agent.id).is_none());
        assert_eq!(events.lock().unwrap()[0].0, EventKind::AgentRemoved);
    }

    #[test]
    fn listener_failure_never_fails_the_roster_operation() {
        let directory = directory_with(|registry| {
            registry
                .register(EventKind::AgentAdded, "failing", Arc::new(Failing))
                .unwrap();
        });

        let account = AccountId::new();
        let result = directory
            .add_agent(Agent::new(account, "Jo", "jo@example.com", AgentRole::Agent).unwrap());

        assert!(result.is_ok());
        assert_eq!(directory.list_for_account(account).len(), 1);
    }

    #[test]
    fn removing_a_missing_agent_is_not_found() {
        let directory = directory_with(|_| {});
        let result = directory.remove_agent(AccountId::new(), UserId::new());
        assert!(matches!(result, Err(DomainError::NotFound)));
    }

    #[test]
    fn duplicate_insert_is_a_conflict() {
        let directory = directory_with(|_| {});
        let agent = Agent::new(AccountId::new(), "Jo", "jo@example.com", AgentRole::Agent)
            .unwrap();

        directory.add_agent(agent.clone()).unwrap();
        assert!(matches!(
            directory.add_agent(agent),
            Err(DomainError::Conflict(_))
        ));
    }
}
