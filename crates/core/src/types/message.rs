//! Chat message records from the `messages` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageId, UserId};

/// A message exchanged between the admin and a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message belongs to the conversation between `a` and `b`,
    /// in either direction.
    #[must_use]
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// Whether `user` sent this message.
    #[must_use]
    pub fn is_from(&self, user: UserId) -> bool {
        self.sender_id == user
    }
}

/// Insert payload for a new message; the remote service assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub content: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
}
