//! Supabase-backed [`DataService`].

use async_trait::async_trait;
use tracing::instrument;

use star_admin_core::{
    ConversationSummary, Message, NewMessage, Product, ProductDraft, ProductId, User, UserId,
};

use super::{DataError, DataService};
use crate::subscription::Subscription;
use crate::supabase::{Direction, Filter, Query, SupabaseClient};

const PRODUCTS_TABLE: &str = "products";
const MESSAGES_TABLE: &str = "messages";
const CONVERSATIONS_RPC: &str = "get_conversations";

/// Data access through the Supabase REST, auth, storage and realtime APIs.
#[derive(Clone)]
pub struct SupabaseDataService {
    client: SupabaseClient,
    bucket: String,
}

impl SupabaseDataService {
    /// Wrap a client; product images go to `bucket`.
    #[must_use]
    pub fn new(client: SupabaseClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl DataService for SupabaseDataService {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, DataError> {
        let query = Query::new().order("created_at", Direction::Descending);
        Ok(self.client.select(PRODUCTS_TABLE, &query).await?)
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn insert_product(&self, draft: &ProductDraft) -> Result<(), DataError> {
        Ok(self.client.insert(PRODUCTS_TABLE, draft).await?)
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> Result<(), DataError> {
        Ok(self
            .client
            .update(PRODUCTS_TABLE, &Filter::eq("id", id), draft)
            .await?)
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: ProductId) -> Result<(), DataError> {
        Ok(self
            .client
            .delete(PRODUCTS_TABLE, &Filter::eq("id", id))
            .await?)
    }

    #[instrument(skip(self, bytes))]
    async fn upload_product_image(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, DataError> {
        self.client
            .upload(&self.bucket, path, content_type, bytes)
            .await?;
        Ok(self.client.public_url(&self.bucket, path))
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>, DataError> {
        Ok(self.client.list_users().await?)
    }

    #[instrument(skip(self))]
    async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, DataError> {
        Ok(self.client.rpc(CONVERSATIONS_RPC).await?)
    }

    #[instrument(skip(self))]
    async fn conversation_messages(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Vec<Message>, DataError> {
        let query = Query::new()
            .filter(Filter::either_direction("sender_id", "receiver_id", a, b))
            .order("created_at", Direction::Ascending);
        Ok(self.client.select(MESSAGES_TABLE, &query).await?)
    }

    #[instrument(skip(self, message), fields(receiver = %message.receiver_id))]
    async fn insert_message(&self, message: &NewMessage) -> Result<(), DataError> {
        Ok(self.client.insert(MESSAGES_TABLE, message).await?)
    }

    #[instrument(skip(self))]
    async fn subscribe_message_inserts(
        &self,
        channel: &str,
    ) -> Result<Subscription<Message>, DataError> {
        Ok(self
            .client
            .subscribe_inserts(channel, MESSAGES_TABLE)
            .await?)
    }
}
