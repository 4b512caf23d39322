//! Message value objects for the local message API.
//!
//! These are the wire types the console and the Direct Client exchange:
//! console sends an `InboundMessage`, the agent answers with an ordered
//! sequence of `ReplyMessage`s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message posted to `POST /{agent_id}/message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The text content.
    pub text: String,

    /// Sender identifier (the console uses a fixed synthetic id).
    #[serde(rename = "userId")]
    pub user_id: String,

    /// Sender display name.
    #[serde(rename = "userName")]
    pub user_name: String,
}

impl InboundMessage {
    /// Construct a message from the local console user.
    pub fn from_console(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user_id: "user".into(),
            user_name: "User".into(),
        }
    }
}

/// One element of the response array. Carries at least `text`; extra
/// fields from richer runtimes are tolerated and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub text: String,

    /// Optional action tag attached by the runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl ReplyMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: None,
        }
    }
}

/// A persisted conversation row. One per inbound and outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub agent_id: String,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
