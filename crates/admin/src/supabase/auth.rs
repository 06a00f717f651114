//! `GoTrue` administrative user listing.
//!
//! The listing endpoint is paginated and requires the service role key.

use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

use star_admin_core::User;

use super::{Credential, SupabaseClient, SupabaseError};

/// Page size requested from the admin listing.
const USERS_PER_PAGE: usize = 200;

/// Stop after this many pages even if the server keeps returning full ones.
const MAX_PAGES: usize = 500;

#[derive(Debug, Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<User>,
}

impl SupabaseClient {
    /// List every registered account.
    ///
    /// Pages are requested until a short page comes back.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::MissingServiceKey` without a service key, or
    /// the remote service's error if a page request fails.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>, SupabaseError> {
        let mut users = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = self.url_with_params(
                "/auth/v1/admin/users",
                &[
                    ("page".to_string(), page.to_string()),
                    ("per_page".to_string(), USERS_PER_PAGE.to_string()),
                ],
            )?;
            let request = self.request(Method::GET, url, Credential::Service)?;
            let batch: UserPage = self.send_json(request).await?;

            let fetched = batch.users.len();
            users.extend(batch.users);

            if fetched < USERS_PER_PAGE {
                break;
            }
        }

        tracing::debug!(count = users.len(), "Listed users");
        Ok(users)
    }
}
