//! The message store contract consumed by the delivery pipeline.

use async_trait::async_trait;

use crate::entities::{Message, NewMessage};
use crate::types::DatabaseResult;

/// Durable, time-ordered storage for direct messages.
///
/// `append` returns only once the row is durable, which is what lets callers
/// push the message live afterwards without risking a phantom delivery.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return it with its store-assigned id.
    async fn append(&self, message: NewMessage) -> DatabaseResult<Message>;

    /// Every message exchanged between `a` and `b`, oldest first.
    async fn query_conversation(&self, a: &str, b: &str) -> DatabaseResult<Vec<Message>>;
}
