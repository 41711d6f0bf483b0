//! Notifier port - 会話への返信

use async_trait::async_trait;

use crate::domain::ConversationId;
use crate::error::ClientError;

/// Delivers a text back to the originating conversation.
///
/// Errors are reported to the caller for logging only; nobody retries them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, destination: &ConversationId, text: &str) -> Result<(), ClientError>;
}
