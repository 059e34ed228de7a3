//! Paperback Client - session and state-consistency core.
//!
//! This crate is the client-side core of a multi-role bookstore: it owns the
//! authenticated session, the cart/wishlist/orders caches, and the role-gated
//! navigation decisions, all kept consistent with a remote REST backend.
//! Rendering is an external concern; a UI layer calls into these services and
//! re-renders from their state.
//!
//! # Architecture
//!
//! - [`gateway::ApiGateway`] - single outbound HTTP point; normalizes every
//!   response into a `{success, data, message}` envelope and reports 401s to
//!   the session through an explicit callback
//! - [`session::SessionService`] - owns identity + credential; upstream of
//!   every user-scoped store
//! - [`stores`] - cart, wishlist, and orders aggregates kept consistent via
//!   fetch-after-mutation
//! - [`catalog::CatalogClient`] - cached read-only book catalog
//! - [`navigation`] - pure role-gate resolution over a closed route set
//!
//! # Consistency rules
//!
//! Every mutation re-fetches the affected aggregates from the backend before
//! reporting completion, so callers always observe post-mutation truth.
//! Mutations on the same aggregate are serialized; responses that resolve
//! after the session they were issued under has ended are discarded.
//!
//! # Example
//!
//! ```rust,ignore
//! use paperback_client::config::ClientConfig;
//! use paperback_client::state::AppState;
//! use paperback_client::storage::FileCredentialStore;
//! use std::sync::Arc;
//!
//! let config = ClientConfig::from_env()?;
//! let storage = Arc::new(FileCredentialStore::new(config.credential_path.clone()));
//! let app = AppState::new(config, storage)?;
//!
//! app.session().initialize().await;
//! let identity = app.session().login("a@x.com", "secret1").await?;
//! app.cart().add(book_id, 1).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod navigation;
pub mod session;
pub mod state;
pub mod storage;
pub mod stores;

pub use error::ClientError;
