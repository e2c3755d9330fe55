//! Redis pub/sub-backed realtime sink (optional).
//!
//! Note: Redis pub/sub is not durable (messages are dropped when the
//! subscriber is offline). That matches the realtime channel's contract:
//! updates are transient UI nudges, not a delivery log.

use redis::Commands;
use serde_json::Value as JsonValue;

use super::{RealtimeSink, SinkError};

/// Publishes realtime payloads to `"<prefix><subscriber_key>"` channels.
#[derive(Debug, Clone)]
pub struct RedisRealtimeSink {
    client: redis::Client,
    channel_prefix: String,
}

impl RedisRealtimeSink {
    pub fn new(
        redis_url: impl AsRef<str>,
        channel_prefix: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let client =
            redis::Client::open(redis_url.as_ref()).map_err(|e| SinkError(e.to_string()))?;
        Ok(Self {
            client,
            channel_prefix: channel_prefix.into(),
        })
    }
}

impl RealtimeSink for RedisRealtimeSink {
    fn push(&self, subscriber_key: &str, payload: &JsonValue) -> Result<(), SinkError> {
        let body = serde_json::to_string(payload).map_err(|e| SinkError(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| SinkError(e.to_string()))?;

        let channel = format!("{}{}", self.channel_prefix, subscriber_key);
        let _: i64 = conn
            .publish(&channel, body)
            .map_err(|e| SinkError(e.to_string()))?;

        Ok(())
    }
}
