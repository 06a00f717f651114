//! Star Admin Core - Shared types library.
//!
//! This crate provides the domain records shared by the Star Admin crates:
//! - `admin` - Admin panel server and remote data access
//! - `cli` - Command-line front-end for the same operations
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Records
//! deserialize directly from the remote service's JSON rows.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, and the product/user/message records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
