//! Core types for Star Admin.
//!
//! This module provides type-safe wrappers and records for the storefront's
//! products, registered users, and admin/customer chat.

pub mod conversation;
pub mod id;
pub mod message;
pub mod price;
pub mod product;
pub mod user;

pub use conversation::{Conversation, ConversationSummary, UNKNOWN_USER_LABEL};
pub use id::*;
pub use message::{Message, NewMessage};
pub use price::{CurrencyCode, Price, PriceError};
pub use product::{Product, ProductDraft};
pub use user::User;
