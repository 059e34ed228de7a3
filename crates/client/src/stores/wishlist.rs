//! Wishlist aggregate store.
//!
//! Mirrors the cart's shape with set semantics instead of quantities:
//! membership is keyed by book id, and adding a book twice leaves a single
//! entry.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use paperback_core::BookId;

use crate::error::ClientError;
use crate::gateway::ApiGateway;
use crate::models::{Book, WishlistItemDto};
use crate::session::{AuthContext, SessionService};

struct WishlistInner {
    gateway: ApiGateway,
    session: SessionService,
    books: RwLock<Vec<Book>>,
    mutation: Mutex<()>,
}

/// Client-side cache of the server-owned wishlist.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistInner>,
}

impl WishlistStore {
    /// Create the store and register its cache-clear with the session.
    #[must_use]
    pub fn new(gateway: ApiGateway, session: SessionService) -> Self {
        let inner = Arc::new(WishlistInner {
            gateway,
            session: session.clone(),
            books: RwLock::new(Vec::new()),
            mutation: Mutex::new(()),
        });

        let weak: Weak<WishlistInner> = Arc::downgrade(&inner);
        session.on_cleared(move || {
            if let Some(inner) = weak.upgrade() {
                inner.clear();
            }
        });

        // Populate without an explicit fetch as soon as an identity appears.
        let weak: Weak<WishlistInner> = Arc::downgrade(&inner);
        session.on_changed(move || {
            let Some(inner) = weak.upgrade() else { return };
            if inner.session.identity().is_none() {
                return;
            }
            let store = Self { inner };
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = store.fetch().await {
                        debug!(error = %e, "wishlist refresh after sign-in failed");
                    }
                });
            }
        });

        Self { inner }
    }

    /// Replace the local wishlist wholesale with server truth.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotAuthenticated`] without a session (no network call
    /// is made); otherwise the gateway's normalized failure.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Vec<Book>, ClientError> {
        let ctx = self.inner.session.auth_context()?;
        self.fetch_with(&ctx).await
    }

    async fn fetch_with(&self, ctx: &AuthContext) -> Result<Vec<Book>, ClientError> {
        let envelope = self
            .inner
            .gateway
            .get::<Vec<WishlistItemDto>>(
                &format!("/wishlist/{}", ctx.user_id),
                &[],
                Some(&ctx.credential),
            )
            .await;

        let books: Vec<Book> = envelope
            .into_data()?
            .into_iter()
            .map(|item| item.book)
            .collect();

        if !self.inner.session.is_current_epoch(ctx.epoch) {
            debug!("discarding stale wishlist fetch");
            return Err(ClientError::SessionExpired);
        }

        self.inner.replace(books.clone());
        debug!(items = books.len(), "wishlist synchronized");
        Ok(books)
    }

    /// Save a book to the wishlist. Saving an already-present book is a
    /// no-op server-side; the set never grows a duplicate.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch`].
    #[instrument(skip(self))]
    pub async fn add(&self, book_id: BookId) -> Result<(), ClientError> {
        let _guard = self.inner.mutation.lock().await;
        let ctx = self.inner.session.auth_context()?;

        let query = [
            ("userId", ctx.user_id.to_string()),
            ("bookId", book_id.to_string()),
        ];
        self.inner
            .gateway
            .post::<serde_json::Value, ()>("/wishlist/add", &query, None, Some(&ctx.credential))
            .await
            .require_success()?;

        self.fetch_with(&ctx).await?;
        Ok(())
    }

    /// Remove a book from the wishlist.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch`].
    #[instrument(skip(self))]
    pub async fn remove(&self, book_id: BookId) -> Result<(), ClientError> {
        let _guard = self.inner.mutation.lock().await;
        let ctx = self.inner.session.auth_context()?;

        let query = [
            ("userId", ctx.user_id.to_string()),
            ("bookId", book_id.to_string()),
        ];
        self.inner
            .gateway
            .delete::<serde_json::Value>("/wishlist/remove", &query, Some(&ctx.credential))
            .await
            .require_success()?;

        self.fetch_with(&ctx).await?;
        Ok(())
    }

    /// Whether the wishlist contains a book.
    #[must_use]
    pub fn contains(&self, book_id: BookId) -> bool {
        self.inner
            .read(|books| books.iter().any(|b| b.id == book_id))
    }

    /// Snapshot of the saved books.
    #[must_use]
    pub fn books(&self) -> Vec<Book> {
        self.inner.read(Clone::clone)
    }

    /// Clear the local cache only; no server call. Invoked automatically
    /// when the session identity is cleared.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl WishlistInner {
    fn read<T>(&self, f: impl FnOnce(&Vec<Book>) -> T) -> T {
        let guard = self.books.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn replace(&self, books: Vec<Book>) {
        let mut guard = self.books.write().unwrap_or_else(PoisonError::into_inner);
        *guard = books;
    }

    fn clear(&self) {
        self.replace(Vec::new());
    }
}
