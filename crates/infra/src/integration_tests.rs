//! Integration tests for the full dispatch pipeline.
//!
//! Tests: producer → Dispatcher → (materializer, webhook emitter, realtime
//! publisher, audit trail) against in-memory stores/transports/sinks.
//!
//! Verifies:
//! - the end-to-end agent.added scenario (setting row + one webhook call)
//! - registration-order execution across different listener variants
//! - failure isolation between variants
//! - idempotence under producer-level re-dispatch

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use supportflow_agents::{Agent, AgentDirectory, AgentRole, InMemoryAgentRoster};
    use supportflow_core::AccountId;
    use supportflow_events::{
        Dispatcher, Event, EventKind, ListenerRegistry, Payload,
    };

    use crate::audit::AuditTrail;
    use crate::notifications::{
        InMemoryNotificationStore, NotificationMaterializer, NotificationSettingsStore,
    };
    use crate::realtime::{InMemoryRealtimeSink, RealtimePublisher};
    use crate::webhooks::{InMemoryEndpointSource, RecordingTransport, WebhookEmitter};

    struct Fixture {
        directory: AgentDirectory<InMemoryAgentRoster>,
        dispatcher: Dispatcher,
        store: Arc<InMemoryNotificationStore>,
        transport: Arc<RecordingTransport>,
        sink: Arc<InMemoryRealtimeSink>,
        trail: Arc<AuditTrail>,
    }

    /// Wire the standard production listener set against in-memory backends:
    /// materializer first, webhook emitter second (the emitter may depend on
    /// settings existing), realtime third, audit across the vocabulary.
    fn fixture(account: AccountId) -> Fixture {
        supportflow_observability::init();

        let store = Arc::new(InMemoryNotificationStore::new());
        let endpoints = Arc::new(InMemoryEndpointSource::new());
        endpoints.add_endpoint(account, "https://hooks.example.com/support");
        let transport = Arc::new(RecordingTransport::new());
        let sink = Arc::new(InMemoryRealtimeSink::new());
        let trail = Arc::new(AuditTrail::new());

        let materializer = Arc::new(NotificationMaterializer::new(store.clone()));
        let emitter = Arc::new(WebhookEmitter::new(endpoints.clone(), transport.clone()));
        let publisher = Arc::new(RealtimePublisher::new(sink.clone()));

        let mut registry = ListenerRegistry::new();
        for kind in [EventKind::AgentAdded, EventKind::AgentRemoved] {
            registry
                .register(kind, "notification_materializer", materializer.clone())
                .unwrap();
            registry
                .register(kind, "webhook_emitter", emitter.clone())
                .unwrap();
            registry
                .register(kind, "realtime_publisher", publisher.clone())
                .unwrap();
        }
        registry
            .register_for_kinds(EventKind::ALL, "audit_trail", trail.clone())
            .unwrap();

        let dispatcher = Dispatcher::new(Arc::new(registry));
        Fixture {
            directory: AgentDirectory::new(InMemoryAgentRoster::new(), dispatcher.clone()),
            dispatcher,
            store,
            transport,
            sink,
            trail,
        }
    }

    #[test]
    fn adding_an_agent_materializes_settings_and_emits_one_webhook() {
        let account = AccountId::new();
        let f = fixture(account);

        let agent = f
            .directory
            .add_agent(Agent::new(account, "Jo", "jo@example.com", AgentRole::Agent).unwrap())
            .unwrap();

        // Notification-setting row exists for the new agent under the account.
        let setting = f.store.get(account, agent.id).unwrap().unwrap();
        assert_eq!(setting.account_id, account);
        assert_eq!(setting.user_id, agent.id);

        // Exactly one outbound webhook call, carrying {id, name, email}.
        let calls = f.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.event, "agent.added");
        assert_eq!(calls[0].1.data, agent.webhook_data());

        // Realtime push went to the agent's pubsub token.
        let pushes = f.sink.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, agent.pubsub_token);

        // And the audit trail saw the event.
        assert_eq!(f.trail.len(), 1);
    }

    #[test]
    fn removing_an_agent_cleans_up_and_notifies_downstream() {
        let account = AccountId::new();
        let f = fixture(account);

        let agent = f
            .directory
            .add_agent(Agent::new(account, "Jo", "jo@example.com", AgentRole::Agent).unwrap())
            .unwrap();
        f.directory.remove_agent(account, agent.id).unwrap();

        assert!(f.store.get(account, agent.id).unwrap().is_none());

        let calls = f.transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1.event, "agent.removed");

        assert_eq!(f.trail.len(), 2);
    }

    #[test]
    fn redispatching_the_same_event_is_idempotent_end_to_end() {
        let account = AccountId::new();
        let f = fixture(account);
        let agent =
            Agent::new(account, "Jo", "jo@example.com", AgentRole::Agent).unwrap();

        // A producer retrying its lifecycle hook re-dispatches the same
        // logical event directly.
        let event = Event::new(EventKind::AgentAdded, Utc::now(), agent.event_payload());
        let first = f.dispatcher.dispatch(event.clone());
        let second = f.dispatcher.dispatch(event);

        assert!(first.fully_delivered());
        assert!(second.fully_delivered());

        // One settings row, one webhook call.
        assert_eq!(f.store.list_for_account(account).unwrap().len(), 1);
        assert_eq!(f.transport.calls().len(), 1);
    }

    #[test]
    fn a_failing_webhook_never_blocks_the_listeners_around_it() {
        let account = AccountId::new();
        let f = fixture(account);
        f.transport.set_failing(true);

        let agent = f
            .directory
            .add_agent(Agent::new(account, "Jo", "jo@example.com", AgentRole::Agent).unwrap())
            .unwrap();

        // The roster write stood, the materializer (before the emitter) and
        // the realtime publisher (after it) both ran.
        assert!(f.directory.get(account, agent.id).is_some());
        assert!(f.store.get(account, agent.id).unwrap().is_some());
        assert_eq!(f.sink.pushes().len(), 1);
        assert_eq!(f.trail.len(), 1);
    }

    #[test]
    fn listener_variants_run_in_registration_order() {
        let account = AccountId::new();
        let f = fixture(account);

        let outcome = f.dispatcher.dispatch(Event::new(
            EventKind::AgentAdded,
            Utc::now(),
            Agent::new(account, "Jo", "jo@example.com", AgentRole::Agent)
                .unwrap()
                .event_payload(),
        ));

        let order: Vec<&str> = outcome
            .deliveries()
            .iter()
            .map(|d| d.listener().as_str())
            .collect();
        assert_eq!(
            order,
            [
                "notification_materializer",
                "webhook_emitter",
                "realtime_publisher",
                "audit_trail"
            ]
        );
    }

    #[test]
    fn conversation_events_flow_to_the_audit_trail_only() {
        let account = AccountId::new();
        let f = fixture(account);

        let outcome = f
            .dispatcher
            .dispatch(Event::new(
                EventKind::ConversationCreated,
                Utc::now(),
                Payload::for_account(account).with("conversation", 42),
            ));

        assert!(outcome.fully_delivered());
        assert_eq!(outcome.len(), 1);
        assert_eq!(f.trail.len(), 1);
        assert!(f.transport.calls().is_empty());
        assert!(f.sink.pushes().is_empty());
    }
}
