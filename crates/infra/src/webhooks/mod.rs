//! Outbound webhook emission.
//!
//! The [`WebhookEmitter`] serializes a reduced view of each event and
//! delivers it to every endpoint configured for the event's account.
//! Endpoint configuration is owned by account settings outside this core;
//! [`EndpointSource`] is the whole interface it presents here.
//!
//! Idempotence: delivery is keyed by (kind, canonical payload). The key is
//! recorded only after every endpoint accepted, so a failed delivery is
//! retried in full when the producer re-dispatches, while an already
//! delivered event becomes a no-op.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::debug;

use supportflow_core::AccountId;
use supportflow_events::{Event, Listener, ListenerError};

pub mod http;

pub use http::HttpWebhookTransport;

// ─────────────────────────────────────────────────────────────────────────────
// Endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// An outbound webhook target belonging to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub account_id: AccountId,
    pub url: String,
}

/// Where the emitter learns an account's configured endpoints.
pub trait EndpointSource: Send + Sync {
    fn endpoints_for(&self, account_id: AccountId) -> Vec<WebhookEndpoint>;
}

impl<S> EndpointSource for Arc<S>
where
    S: EndpointSource + ?Sized,
{
    fn endpoints_for(&self, account_id: AccountId) -> Vec<WebhookEndpoint> {
        (**self).endpoints_for(account_id)
    }
}

/// In-memory endpoint configuration for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryEndpointSource {
    inner: RwLock<HashMap<AccountId, Vec<WebhookEndpoint>>>,
}

impl InMemoryEndpointSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_endpoint(&self, account_id: AccountId, url: impl Into<String>) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(account_id).or_default().push(WebhookEndpoint {
                account_id,
                url: url.into(),
            });
        }
    }
}

impl EndpointSource for InMemoryEndpointSource {
    fn endpoints_for(&self, account_id: AccountId) -> Vec<WebhookEndpoint> {
        match self.inner.read() {
            Ok(map) => map.get(&account_id).cloned().unwrap_or_default(),
            Err(_) => vec![],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire body
// ─────────────────────────────────────────────────────────────────────────────

/// The JSON body POSTed to an endpoint: event name, business time, and a
/// reduced data view. User-class events project the `user` object down to
/// `{id, name, email}`; everything else carries the raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub data: JsonValue,
}

impl WebhookPayload {
    fn from_event(event: &Event) -> Result<Self, ListenerError> {
        let data = if event.kind().is_user_event() {
            let user = event
                .payload()
                .user()
                .ok_or(ListenerError::MissingAttribute("user"))?;
            json!({
                "id": user.get("id").cloned().unwrap_or(JsonValue::Null),
                "name": user.get("name").cloned().unwrap_or(JsonValue::Null),
                "email": user.get("email").cloned().unwrap_or(JsonValue::Null),
            })
        } else {
            event.payload().to_value()
        };

        Ok(Self {
            event: event.kind().as_str().to_string(),
            timestamp: event.occurred_at(),
            data,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Delivery failure for a single endpoint call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint answered with a non-success status.
    #[error("endpoint rejected the delivery with status {status}")]
    Rejected { status: u16 },

    /// The endpoint could not be reached (connect/timeout/TLS/...).
    #[error("network failure: {0}")]
    Network(String),
}

/// How a webhook body reaches an endpoint.
pub trait WebhookTransport: Send + Sync {
    fn deliver(
        &self,
        endpoint: &WebhookEndpoint,
        payload: &WebhookPayload,
    ) -> Result<(), TransportError>;
}

impl<T> WebhookTransport for Arc<T>
where
    T: WebhookTransport + ?Sized,
{
    fn deliver(
        &self,
        endpoint: &WebhookEndpoint,
        payload: &WebhookPayload,
    ) -> Result<(), TransportError> {
        (**self).deliver(endpoint, payload)
    }
}

/// Transport that records calls instead of sending them. For tests/dev; can
/// be toggled to fail every delivery.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<(String, WebhookPayload)>>,
    failing: std::sync::atomic::AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery fail with a network error.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Every delivered (url, body) pair, in delivery order.
    pub fn calls(&self) -> Vec<(String, WebhookPayload)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl WebhookTransport for RecordingTransport {
    fn deliver(
        &self,
        endpoint: &WebhookEndpoint,
        payload: &WebhookPayload,
    ) -> Result<(), TransportError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(TransportError::Network("injected failure".to_string()));
        }

        self.calls
            .lock()
            .map_err(|_| TransportError::Network("recorder lock poisoned".to_string()))?
            .push((endpoint.url.clone(), payload.clone()));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listener
// ─────────────────────────────────────────────────────────────────────────────

/// Emits a reduced event view to every endpoint of the event's account.
pub struct WebhookEmitter<E, T> {
    endpoints: E,
    transport: T,
    delivered: Mutex<HashSet<String>>,
}

impl<E, T> WebhookEmitter<E, T>
where
    E: EndpointSource,
    T: WebhookTransport,
{
    pub fn new(endpoints: E, transport: T) -> Self {
        Self {
            endpoints,
            transport,
            delivered: Mutex::new(HashSet::new()),
        }
    }

    /// Stable identity of a logical event: kind plus the canonical (sorted
    /// key) payload serialization. Two dispatches of the same logical event
    /// produce the same key even if their payloads were assembled in a
    /// different order.
    fn dedup_key(event: &Event) -> Result<String, ListenerError> {
        let payload = serde_json::to_string(event.payload())
            .map_err(|e| ListenerError::Other(e.into()))?;
        Ok(format!("{}\n{}", event.kind(), payload))
    }
}

impl<E, T> Listener for WebhookEmitter<E, T>
where
    E: EndpointSource,
    T: WebhookTransport,
{
    fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        let account = event
            .payload()
            .account()
            .ok_or(ListenerError::MissingAttribute("account"))?;

        let key = Self::dedup_key(event)?;
        {
            let delivered = self
                .delivered
                .lock()
                .map_err(|_| ListenerError::Delivery("dedup lock poisoned".to_string()))?;
            if delivered.contains(&key) {
                debug!(kind = %event.kind(), account = %account, "webhook already delivered; skipping");
                return Ok(());
            }
        }

        let endpoints = self.endpoints.endpoints_for(account);
        if endpoints.is_empty() {
            return Ok(());
        }

        let body = WebhookPayload::from_event(event)?;
        for endpoint in &endpoints {
            self.transport
                .deliver(endpoint, &body)
                .map_err(|e| ListenerError::Delivery(format!("{}: {e}", endpoint.url)))?;
        }

        self.delivered
            .lock()
            .map_err(|_| ListenerError::Delivery("dedup lock poisoned".to_string()))?
            .insert(key);
        Ok(())
    }
}
