use async_trait::async_trait;
use serde_json::Value;

use crate::CoreResult;

/// Outbound domain event stream. Publishing is fire-and-forget from the
/// caller's point of view: a failure never rolls back the state change.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &Value) -> CoreResult<()>;
}

/// Used when no broker is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &Value) -> CoreResult<()> {
        tracing::debug!("event {}/{}: {}", topic, key, payload);
        Ok(())
    }
}
