//! Subcommand implementations and the backend they share.

pub mod chat;
pub mod products;
pub mod users;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use star_admin::config::{AdminConfig, ConfigError, DEFAULT_ADMIN_USER_ID};
use star_admin::data::{DataService, InMemoryDataService};
use star_admin::services::{ChatError, ConversationError, ProductError, RosterError};
use star_admin::supabase::SupabaseError;
use star_admin_core::{ProductDraft, ProductId, User, UserId};

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Supabase client error: {0}")]
    Supabase(#[from] SupabaseError),

    #[error(transparent)]
    Products(#[from] ProductError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Conversations(#[from] ConversationError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Could not read image {path}: {source}")]
    Image {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The data service a command runs against, plus the operator identity.
pub struct Backend {
    data: Arc<dyn DataService>,
    admin_user_id: UserId,
}

impl Backend {
    /// Connect to Supabase from the environment, or build the seeded
    /// in-memory backend.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if configuration is missing or invalid.
    pub fn connect(in_memory: bool) -> Result<Self, CliError> {
        if in_memory {
            dotenvy::dotenv().ok();
            let raw = std::env::var("ADMIN_USER_ID").unwrap_or_else(|_| DEFAULT_ADMIN_USER_ID.to_string());
            let admin_user_id = raw
                .parse::<UserId>()
                .map_err(|e| CliError::InvalidEnvVar("ADMIN_USER_ID", e.to_string()))?;
            tracing::info!(%admin_user_id, "Using in-memory demo backend");
            return Ok(Self {
                data: Arc::new(demo_data(admin_user_id)),
                admin_user_id,
            });
        }

        let config = AdminConfig::from_env()?;
        let data = star_admin::supabase_data_service(&config)?;
        Ok(Self {
            data,
            admin_user_id: config.admin_user_id,
        })
    }

    pub fn data(&self) -> &dyn DataService {
        self.data.as_ref()
    }

    pub fn data_handle(&self) -> Arc<dyn DataService> {
        Arc::clone(&self.data)
    }

    pub const fn admin_user_id(&self) -> UserId {
        self.admin_user_id
    }
}

/// Demo customer with an email and a chat history.
pub const DEMO_CUSTOMER: UserId = UserId::new(Uuid::from_u128(0x6f1c_2a4e_0b7d_4c55_9a43_2f6f_0e8b_1d11));

/// Demo phone-only customer (no email).
pub const DEMO_PHONE_CUSTOMER: UserId =
    UserId::new(Uuid::from_u128(0x1b9e_77c0_5d2a_4f8e_8c61_a0d4_3e57_9b20));

fn demo_data(admin: UserId) -> InMemoryDataService {
    let data = InMemoryDataService::new(admin);
    let now = Utc::now();

    data.seed_product(
        ProductDraft {
            name: "Emerald Velvet Sofa".to_string(),
            description: "Three-seater with solid oak legs".to_string(),
            price: Decimal::from(450_000),
            image_url: Some("memory://product-images/public/sofa.png".to_string()),
        },
        now - Duration::days(2),
    );
    data.seed_product(
        ProductDraft {
            name: "Oak Dining Table".to_string(),
            description: "Seats six, hand-finished".to_string(),
            price: Decimal::from(325_000),
            image_url: Some("memory://product-images/public/table.jpg".to_string()),
        },
        now - Duration::days(1),
    );

    data.seed_user(User {
        id: DEMO_CUSTOMER,
        email: Some("ada@example.com".to_string()),
        created_at: now - Duration::days(30),
        last_sign_in_at: Some(now - Duration::hours(3)),
    });
    data.seed_user(User {
        id: DEMO_PHONE_CUSTOMER,
        email: None,
        created_at: now - Duration::days(7),
        last_sign_in_at: None,
    });

    data.seed_message(
        DEMO_CUSTOMER,
        admin,
        "Is the velvet sofa available in blue?",
        now - Duration::minutes(40),
    );
    data.seed_message(
        admin,
        DEMO_CUSTOMER,
        "Yes, it ships in about two weeks.",
        now - Duration::minutes(35),
    );
    data.seed_message(
        DEMO_PHONE_CUSTOMER,
        admin,
        "Hello, do you deliver to Abuja?",
        now - Duration::minutes(10),
    );

    data
}

/// Whether a confirmation answer means yes.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use star_admin::services::load_conversations;
    use star_admin_core::UNKNOWN_USER_LABEL;

    fn admin() -> UserId {
        DEFAULT_ADMIN_USER_ID.parse().unwrap()
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn test_demo_data_conversations_most_recent_first() {
        let data = demo_data(admin());
        let conversations = load_conversations(&data).await.unwrap();

        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].user_id, DEMO_PHONE_CUSTOMER);
        assert_eq!(conversations[0].email, UNKNOWN_USER_LABEL);
        assert_eq!(conversations[1].user_id, DEMO_CUSTOMER);
        assert_eq!(conversations[1].email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_demo_data_products_newest_first() {
        let data = demo_data(admin());
        let products = data.list_products().await.unwrap();

        let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Oak Dining Table", "Emerald Velvet Sofa"]);
    }
}
