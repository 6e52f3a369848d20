use async_trait::async_trait;

use super::Delivery;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError>;

    /// Runs before a message that exhausted its deliveries is moved to the
    /// dead-letter stream. An error leaves the message pending for another pass.
    async fn on_dead_letter(&self, _delivery: &Delivery, _reason: &str) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// What the consumer should do with a message whose handler did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Leave the entry pending; it is retried once it goes stale.
    #[error("retry later: {0}")]
    Retry(String),
    /// The entry can never succeed; log it and acknowledge.
    #[error("discarded: {0}")]
    Discard(String),
}
