//! Data access interface.
//!
//! Every remote call the panel makes goes through [`DataService`]. The
//! production implementation talks to Supabase; the in-memory one backs tests
//! and the offline demo mode of the CLI.

mod memory;
mod supabase;

pub use memory::{InMemoryDataService, Operation, UploadedImage};
pub use supabase::SupabaseDataService;

use async_trait::async_trait;
use thiserror::Error;

use star_admin_core::{
    ConversationSummary, Message, NewMessage, Product, ProductDraft, ProductId, User, UserId,
};

use crate::subscription::Subscription;
use crate::supabase::SupabaseError;

/// Errors surfaced by a [`DataService`].
#[derive(Debug, Error)]
pub enum DataError {
    /// The remote service rejected or failed the call; the message is shown verbatim.
    #[error("{0}")]
    Remote(SupabaseError),

    /// An administrative call was made without the elevated credential.
    #[error("Supabase service key not found. Set SUPABASE_SERVICE_KEY to enable user listing.")]
    MissingCredential,

    /// The backend could not serve the call.
    #[error("{0}")]
    Unavailable(String),
}

impl From<SupabaseError> for DataError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::MissingServiceKey => Self::MissingCredential,
            other => Self::Remote(other),
        }
    }
}

impl DataError {
    /// Whether this error comes from configuration rather than the remote side.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingCredential)
    }
}

/// Narrow interface over the backend: query, write, upload, list users,
/// subscribe.
#[async_trait]
pub trait DataService: Send + Sync {
    /// All products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, DataError>;

    async fn insert_product(&self, draft: &ProductDraft) -> Result<(), DataError>;

    /// Update the product with `id`; a `None` image URL keeps the stored one.
    async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> Result<(), DataError>;

    async fn delete_product(&self, id: ProductId) -> Result<(), DataError>;

    /// Store a product image and return its public URL.
    async fn upload_product_image(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, DataError>;

    /// Every registered account. Requires the elevated credential.
    async fn list_users(&self) -> Result<Vec<User>, DataError>;

    /// Counterparts with their latest message time, most recent first.
    async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, DataError>;

    /// Messages exchanged between `a` and `b` in either direction, oldest first.
    async fn conversation_messages(&self, a: UserId, b: UserId)
    -> Result<Vec<Message>, DataError>;

    async fn insert_message(&self, message: &NewMessage) -> Result<(), DataError>;

    /// Subscribe to every message insert on `channel`.
    ///
    /// Returns once the subscription is active. Filtering to a conversation is
    /// the caller's job.
    async fn subscribe_message_inserts(
        &self,
        channel: &str,
    ) -> Result<Subscription<Message>, DataError>;
}
