//! Derived conversation entries for the chat sidebar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{User, UserId};

/// Label shown for counterparts missing from the user roster.
pub const UNKNOWN_USER_LABEL: &str = "Unknown User";

/// A row returned by the `get_conversations` remote procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The counterpart (non-admin participant).
    pub user_id: UserId,
    /// Timestamp of the most recent message in either direction.
    pub last_message_time: DateTime<Utc>,
}

/// A conversation with its display label resolved against the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub user_id: UserId,
    pub last_message_time: DateTime<Utc>,
    pub email: String,
}

impl Conversation {
    /// Attach a display label from the roster entry, if any.
    #[must_use]
    pub fn resolve(summary: ConversationSummary, user: Option<&User>) -> Self {
        let email = user
            .and_then(|u| u.email.clone())
            .unwrap_or_else(|| UNKNOWN_USER_LABEL.to_string());

        Self {
            user_id: summary.user_id,
            last_message_time: summary.last_message_time,
            email,
        }
    }
}
