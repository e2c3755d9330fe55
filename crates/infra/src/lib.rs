//! `supportflow-infra` — concrete listener variants and the adapters they own.
//!
//! The dispatcher owns nothing but the registry and the dispatch loop; every
//! external resource lives here, owned by the listener that needs it:
//!
//! - [`notifications`]: the notification-setting materializer and its
//!   stores (in-memory, Postgres)
//! - [`webhooks`]: the webhook emitter, endpoint configuration, and
//!   transports (recording, HTTP)
//! - [`realtime`]: the realtime publisher and its pub/sub sinks
//!   (in-memory, Redis behind the `redis` feature)
//! - [`audit`]: the audit trail listener

pub mod audit;
pub mod notifications;
pub mod realtime;
pub mod webhooks;

#[cfg(test)]
mod integration_tests;

pub use audit::{AuditEntry, AuditTrail};
pub use notifications::{
    EmailFlag, InMemoryNotificationStore, NotificationMaterializer, NotificationSetting,
    NotificationSettingsStore, PostgresNotificationStore, StoreError,
};
#[cfg(feature = "redis")]
pub use realtime::RedisRealtimeSink;
pub use realtime::{InMemoryRealtimeSink, RealtimePublisher, RealtimeSink, SinkError};
pub use webhooks::{
    EndpointSource, HttpWebhookTransport, InMemoryEndpointSource, RecordingTransport,
    TransportError, WebhookEmitter, WebhookEndpoint, WebhookPayload, WebhookTransport,
};
