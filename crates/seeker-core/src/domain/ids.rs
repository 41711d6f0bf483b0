//! Domain identifiers.
//!
//! - `ConversationId`: 返信先。チャットプラットフォームが決める opaque な ID
//! - `DeliveryId`: 1 配送ごとに振る ULID。ログの相関用で、wire には載らない

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use ulid::Ulid;

/// Opaque destination identifier for replies.
///
/// Chat platforms hand these out either as integers (Telegram chat ids) or as
/// strings, so both shapes are accepted on the wire. Numeric ids are written
/// back as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An id with no usable content cannot receive a reply.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn as_integer(&self) -> Option<i64> {
        let n: i64 = self.0.parse().ok()?;
        (n.to_string() == self.0).then_some(n)
    }
}

impl From<i64> for ConversationId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for ConversationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_integer() {
            Some(n) => serializer.serialize_i64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Self::from(n),
            Raw::Str(s) => Self(s),
        })
    }
}

/// Per-delivery correlation id (ULID, sortable by time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId(Ulid);

impl DeliveryId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery-{}", self.0)
    }
}
