//! Conversation list for the chat sidebar.

use std::collections::HashMap;

use thiserror::Error;
use tracing::instrument;

use star_admin_core::{Conversation, User, UserId};

use crate::data::{DataError, DataService};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Could not fetch conversations: {0}")]
    Fetch(#[from] DataError),
}

impl ConversationError {
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        match self {
            Self::Fetch(err) => err.is_configuration(),
        }
    }
}

/// Counterparts who have messaged with the admin, most recent first, labelled
/// with their email.
///
/// The roster is only fetched when there is at least one conversation.
/// Ordering is the one returned by the remote procedure.
///
/// # Errors
///
/// Returns `ConversationError` if either fetch fails; no partial list is
/// produced.
#[instrument(skip(data))]
pub async fn load_conversations(data: &dyn DataService) -> Result<Vec<Conversation>, ConversationError> {
    let summaries = data.get_conversations().await?;
    if summaries.is_empty() {
        return Ok(Vec::new());
    }

    let users = data.list_users().await?;
    let by_id: HashMap<UserId, &User> = users.iter().map(|u| (u.id, u)).collect();

    Ok(summaries
        .into_iter()
        .map(|summary| {
            let user = by_id.get(&summary.user_id).copied();
            Conversation::resolve(summary, user)
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::data::{InMemoryDataService, Operation};
    use chrono::{Duration, Utc};
    use star_admin_core::UNKNOWN_USER_LABEL;
    use uuid::Uuid;

    fn admin() -> UserId {
        UserId::new(Uuid::from_u128(1))
    }

    fn id(n: u128) -> UserId {
        UserId::new(Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn test_empty_result_skips_roster() {
        let data = InMemoryDataService::new(admin());
        data.fail(Operation::ListUsers, "should not be called");

        let conversations = load_conversations(&data).await.unwrap();
        assert!(conversations.is_empty());
    }

    #[tokio::test]
    async fn test_most_recent_first_with_labels() {
        let data = InMemoryDataService::new(admin());
        let t = Utc::now() - Duration::hours(2);
        // A at t1 < t2, B at t3 > t2.
        data.seed_message(id(10), admin(), "hi", t);
        data.seed_message(admin(), id(10), "hello", t + Duration::minutes(1));
        data.seed_message(id(20), admin(), "order?", t + Duration::minutes(5));
        data.seed_user(User {
            id: id(10),
            email: Some("a@example.ng".to_string()),
            created_at: t,
            last_sign_in_at: None,
        });

        let conversations = load_conversations(&data).await.unwrap();
        let labels: Vec<&str> = conversations.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(labels, vec![UNKNOWN_USER_LABEL, "a@example.ng"]);
        assert_eq!(conversations[0].user_id, id(20));
    }

    #[tokio::test]
    async fn test_roster_failure_yields_error() {
        let data = InMemoryDataService::new(admin()).without_service_key();
        data.seed_message(id(10), admin(), "hi", Utc::now());

        let err = load_conversations(&data).await.unwrap_err();
        assert!(err.is_configuration());
    }
}
