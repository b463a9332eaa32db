use crate::errors::Result;
use async_trait::async_trait;

/// Subscribe side of a message bus connection.
#[async_trait]
pub trait PubSubClient: Send + Sync {
    /// Subscribes with at-least-once delivery. Repeating a filter the
    /// connection already holds must succeed.
    async fn subscribe(&self, filter: &str) -> Result<()>;
}
