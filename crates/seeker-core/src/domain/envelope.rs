//! TaskEnvelope - キューを流れる唯一のデータ
//!
//! Wire format: `{"chat_id": <id>, "text": <string>}` (JSON, UTF-8).

use serde::{Deserialize, Deserializer, Serialize};

use super::ids::ConversationId;
use crate::error::CodecError;

/// One unit of work: where to reply, and what the user asked.
///
/// Envelopes are never mutated after creation. A decoded envelope may lack a
/// destination; [`TaskEnvelope::destination`] is the deliverability guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chat_id: Option<ConversationId>,

    #[serde(default, deserialize_with = "null_as_empty")]
    text: String,
}

impl TaskEnvelope {
    pub fn new(chat_id: ConversationId, text: impl Into<String>) -> Self {
        Self {
            chat_id: Some(chat_id),
            text: text.into(),
        }
    }

    pub fn chat_id(&self) -> Option<&ConversationId> {
        self.chat_id.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Reply destination, or `None` when the envelope is undeliverable
    /// (missing or empty `chat_id`).
    pub fn destination(&self) -> Option<&ConversationId> {
        self.chat_id.as_ref().filter(|id| !id.is_empty())
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
