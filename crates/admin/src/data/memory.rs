//! In-memory [`DataService`] for tests and offline demos.
//!
//! Behaves like the remote service as far as the panel can observe: rows get
//! ids and timestamps on insert, list queries come back ordered, and every
//! message insert is pushed to all open subscriptions. Individual operations
//! can be made to fail to exercise error paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};

use star_admin_core::{
    ConversationSummary, Message, MessageId, NewMessage, Product, ProductDraft, ProductId, User,
    UserId,
};

use super::{DataError, DataService};
use crate::config::DEFAULT_PRODUCT_IMAGE_BUCKET;
use crate::subscription::{EVENT_BUFFER, Subscription};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListProducts,
    InsertProduct,
    UpdateProduct,
    DeleteProduct,
    UploadImage,
    ListUsers,
    GetConversations,
    ConversationMessages,
    InsertMessage,
    Subscribe,
}

/// An object accepted by [`DataService::upload_product_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub path: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Default)]
struct Store {
    products: Vec<Product>,
    next_product_id: i64,
    users: Vec<User>,
    messages: Vec<Message>,
    next_message_id: i64,
    images: Vec<UploadedImage>,
    subscribers: Vec<mpsc::Sender<Message>>,
    failures: HashMap<Operation, String>,
    stalled: HashSet<Operation>,
    writes: usize,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Store {
    /// Current time, strictly after every timestamp handed out before.
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    fn observe(&mut self, at: DateTime<Utc>) {
        if self.last_timestamp.is_none_or(|last| at > last) {
            self.last_timestamp = Some(at);
        }
    }

    fn check(&self, op: Operation) -> Result<(), DataError> {
        match self.failures.get(&op) {
            Some(message) => Err(DataError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn broadcast(&mut self, message: &Message) {
        self.subscribers.retain(|tx| match tx.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(id = %message.id, "Subscriber lagging, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

/// Process-local stand-in for the remote service.
pub struct InMemoryDataService {
    admin_user_id: UserId,
    bucket: String,
    service_key: bool,
    store: Mutex<Store>,
}

impl InMemoryDataService {
    /// Empty backend whose conversations are computed relative to `admin_user_id`.
    #[must_use]
    pub fn new(admin_user_id: UserId) -> Self {
        Self {
            admin_user_id,
            bucket: DEFAULT_PRODUCT_IMAGE_BUCKET.to_string(),
            service_key: true,
            store: Mutex::new(Store {
                next_product_id: 1,
                next_message_id: 1,
                ..Store::default()
            }),
        }
    }

    /// Behave as if the elevated credential were not configured.
    #[must_use]
    pub const fn without_service_key(mut self) -> Self {
        self.service_key = false;
        self
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a product with a fixed creation time.
    pub fn seed_product(&self, draft: ProductDraft, created_at: DateTime<Utc>) -> Product {
        let mut store = self.store();
        store.observe(created_at);
        let product = Product {
            id: ProductId::new(store.next_product_id),
            name: draft.name,
            description: draft.description,
            price: draft.price,
            image_url: draft.image_url,
            created_at,
        };
        store.next_product_id += 1;
        store.products.push(product.clone());
        product
    }

    pub fn seed_user(&self, user: User) {
        self.store().users.push(user);
    }

    /// Store a message with a fixed creation time without notifying subscribers.
    pub fn seed_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Message {
        let mut store = self.store();
        store.observe(created_at);
        let message = Message {
            id: MessageId::new(store.next_message_id),
            sender_id,
            receiver_id,
            content: content.to_string(),
            created_at,
        };
        store.next_message_id += 1;
        store.messages.push(message.clone());
        message
    }

    /// Push a change event to every subscriber without storing it.
    pub fn push_event(&self, message: &Message) {
        self.store().broadcast(message);
    }

    /// Make `op` fail with `message` until cleared.
    pub fn fail(&self, op: Operation, message: &str) {
        self.store().failures.insert(op, message.to_string());
    }

    pub fn clear_failure(&self, op: Operation) {
        self.store().failures.remove(&op);
    }

    /// Make `op` never complete, until [`Self::resume`].
    pub fn stall(&self, op: Operation) {
        self.store().stalled.insert(op);
    }

    pub fn resume(&self, op: Operation) {
        self.store().stalled.remove(&op);
    }

    async fn gate(&self, op: Operation) {
        let stalled = self.store().stalled.contains(&op);
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    /// Number of write calls that reached the backend, failed or not.
    #[must_use]
    pub fn remote_writes(&self) -> usize {
        self.store().writes
    }

    /// Subscriptions that have not been released.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        let mut store = self.store();
        store.subscribers.retain(|tx| !tx.is_closed());
        store.subscribers.len()
    }

    /// Uploaded images, in upload order.
    #[must_use]
    pub fn uploaded_images(&self) -> Vec<UploadedImage> {
        self.store().images.clone()
    }

    /// Every stored message, in insertion order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.store().messages.clone()
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}/{path}", self.bucket)
    }
}

#[async_trait]
impl DataService for InMemoryDataService {
    async fn list_products(&self) -> Result<Vec<Product>, DataError> {
        let store = self.store();
        store.check(Operation::ListProducts)?;
        let mut products = store.products.clone();
        products.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.get().cmp(&a.id.get()))
        });
        Ok(products)
    }

    async fn insert_product(&self, draft: &ProductDraft) -> Result<(), DataError> {
        let mut store = self.store();
        store.writes += 1;
        store.check(Operation::InsertProduct)?;
        let created_at = store.now();
        let product = Product {
            id: ProductId::new(store.next_product_id),
            name: draft.name.clone(),
            description: draft.description.clone(),
            price: draft.price,
            image_url: draft.image_url.clone(),
            created_at,
        };
        store.next_product_id += 1;
        store.products.push(product);
        Ok(())
    }

    async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> Result<(), DataError> {
        let mut store = self.store();
        store.writes += 1;
        store.check(Operation::UpdateProduct)?;
        if let Some(product) = store.products.iter_mut().find(|p| p.id == id) {
            product.name.clone_from(&draft.name);
            product.description.clone_from(&draft.description);
            product.price = draft.price;
            if let Some(url) = &draft.image_url {
                product.image_url = Some(url.clone());
            }
        }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), DataError> {
        let mut store = self.store();
        store.writes += 1;
        store.check(Operation::DeleteProduct)?;
        store.products.retain(|p| p.id != id);
        Ok(())
    }

    async fn upload_product_image(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, DataError> {
        let mut store = self.store();
        store.writes += 1;
        store.check(Operation::UploadImage)?;
        if store.images.iter().any(|i| i.path == path) {
            return Err(DataError::Unavailable(
                "The resource already exists".to_string(),
            ));
        }
        store.images.push(UploadedImage {
            path: path.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        });
        drop(store);
        Ok(self.public_url(path))
    }

    async fn list_users(&self) -> Result<Vec<User>, DataError> {
        if !self.service_key {
            return Err(DataError::MissingCredential);
        }
        let store = self.store();
        store.check(Operation::ListUsers)?;
        Ok(store.users.clone())
    }

    async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, DataError> {
        let store = self.store();
        store.check(Operation::GetConversations)?;

        let admin = self.admin_user_id;
        let mut latest: HashMap<UserId, DateTime<Utc>> = HashMap::new();
        for message in &store.messages {
            let counterpart = if message.sender_id == admin {
                message.receiver_id
            } else if message.receiver_id == admin {
                message.sender_id
            } else {
                continue;
            };
            latest
                .entry(counterpart)
                .and_modify(|t| *t = (*t).max(message.created_at))
                .or_insert(message.created_at);
        }

        let mut summaries: Vec<ConversationSummary> = latest
            .into_iter()
            .map(|(user_id, last_message_time)| ConversationSummary {
                user_id,
                last_message_time,
            })
            .collect();
        summaries.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        Ok(summaries)
    }

    async fn conversation_messages(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Vec<Message>, DataError> {
        self.gate(Operation::ConversationMessages).await;
        let store = self.store();
        store.check(Operation::ConversationMessages)?;
        let mut messages: Vec<Message> = store
            .messages
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<(), DataError> {
        let mut store = self.store();
        store.writes += 1;
        store.check(Operation::InsertMessage)?;
        let created_at = store.now();
        let stored = Message {
            id: MessageId::new(store.next_message_id),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content.clone(),
            created_at,
        };
        store.next_message_id += 1;
        store.messages.push(stored.clone());
        store.broadcast(&stored);
        Ok(())
    }

    async fn subscribe_message_inserts(
        &self,
        channel: &str,
    ) -> Result<Subscription<Message>, DataError> {
        self.gate(Operation::Subscribe).await;
        let mut store = self.store();
        store.check(Operation::Subscribe)?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        store.subscribers.push(tx);
        tracing::debug!(%channel, "In-memory subscription opened");
        Ok(Subscription::new(channel, rx, None))
    }
}
