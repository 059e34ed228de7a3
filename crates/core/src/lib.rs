//! Paperback Core - Shared types library.
//!
//! This crate provides common types used across all Paperback components:
//! - `client` - Session, cart, wishlist, and navigation core
//! - `integration-tests` - Scenario tests against a fake backend
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, roles, and money

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
