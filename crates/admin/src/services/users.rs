//! Read-only user roster.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use star_admin_core::{User, UserId};

use crate::data::{DataError, DataService};

/// Shown for accounts that have never signed in.
pub const NEVER_SIGNED_IN: &str = "Never";

/// Timestamp format used across roster and chat listings.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Error loading users: {0}")]
    Load(#[from] DataError),
}

impl RosterError {
    /// Whether the roster is unavailable because of missing configuration.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        match self {
            Self::Load(err) => err.is_configuration(),
        }
    }
}

/// One roster row, formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub id: UserId,
    pub email: String,
    pub signed_up: String,
    pub last_sign_in: String,
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

impl From<&User> for RosterEntry {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone().unwrap_or_default(),
            signed_up: format_timestamp(user.created_at),
            last_sign_in: user
                .last_sign_in_at
                .map_or_else(|| NEVER_SIGNED_IN.to_string(), format_timestamp),
        }
    }
}

/// Fetch every registered account.
///
/// # Errors
///
/// Returns `RosterError` if the elevated credential is missing or the listing fails.
#[instrument(skip(data))]
pub async fn load_roster(data: &dyn DataService) -> Result<Vec<User>, RosterError> {
    let users = data.list_users().await?;
    tracing::debug!(count = users.len(), "Roster loaded");
    Ok(users)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataService;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn user(last: Option<DateTime<Utc>>) -> User {
        User {
            id: UserId::new(Uuid::from_u128(5)),
            email: Some("ada@example.ng".to_string()),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            last_sign_in_at: last,
        }
    }

    #[test]
    fn test_entry_never_signed_in() {
        let entry = RosterEntry::from(&user(None));
        assert_eq!(entry.last_sign_in, "Never");
        assert_eq!(entry.signed_up, "2025-03-01 09:30:00 UTC");
    }

    #[test]
    fn test_entry_with_sign_in() {
        let at = Utc.with_ymd_and_hms(2025, 4, 2, 18, 0, 5).unwrap();
        let entry = RosterEntry::from(&user(Some(at)));
        assert_eq!(entry.last_sign_in, "2025-04-02 18:00:05 UTC");
    }

    #[tokio::test]
    async fn test_missing_service_key_is_configuration_error() {
        let data = InMemoryDataService::new(UserId::new(Uuid::from_u128(1))).without_service_key();
        let err = load_roster(&data).await.unwrap_err();

        assert!(err.is_configuration());
        assert!(err.to_string().starts_with("Error loading users: Supabase service key not found"));
    }

    #[tokio::test]
    async fn test_roster_lists_seeded_users() {
        let data = InMemoryDataService::new(UserId::new(Uuid::from_u128(1)));
        data.seed_user(user(None));

        let users = load_roster(&data).await.unwrap();
        assert_eq!(users.len(), 1);
    }
}
