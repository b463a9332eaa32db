use crate::errors::{ConnectionError, PublishError};
use async_trait::async_trait;

/// Publish side of a message bus connection, owned by one device session.
///
/// Implementations deliver every publish at least once (QoS 1).
#[async_trait]
pub trait PubSubClient: Send + Sync {
    /// Completes the handshake. Callers bound the wait themselves.
    async fn connect(&mut self) -> Result<(), ConnectionError>;

    async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError>;

    /// Closes the connection after pending publishes were handed off.
    async fn disconnect(&mut self) -> Result<(), ConnectionError>;
}
