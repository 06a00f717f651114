//! Business logic services for admin.
//!
//! # Services
//!
//! - `products` - Product CRUD with image upload
//! - `users` - Read-only user roster
//! - `conversations` - Chat sidebar conversation list
//! - `chat` - Per-counterpart message synchronization and sending

pub mod chat;
pub mod conversations;
pub mod products;
pub mod users;

pub use chat::{ChatError, MessageSynchronizer, channel_name, send_message};
pub use conversations::{ConversationError, load_conversations};
pub use products::{ImageUpload, ProductError, ProductForm, ProductService};
pub use users::{NEVER_SIGNED_IN, RosterEntry, RosterError, format_timestamp, load_roster};
