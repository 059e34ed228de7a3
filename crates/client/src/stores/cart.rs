//! Cart aggregate store.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use paperback_core::{BookId, line_total, round_money};

use crate::error::ClientError;
use crate::gateway::ApiGateway;
use crate::models::{CartEntry, CartItemDto};
use crate::session::{AuthContext, SessionService};

struct CartInner {
    gateway: ApiGateway,
    session: SessionService,
    entries: RwLock<Vec<CartEntry>>,
    /// Serializes mutations: held across the server call and the refresh.
    mutation: Mutex<()>,
}

/// Client-side cache of the server-owned cart.
///
/// At most one entry per book id; an entry's quantity is always >= 1
/// (updating to zero or below deletes the entry, exactly as `remove` does).
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartInner>,
}

impl CartStore {
    /// Create the store and register its cache-clear with the session.
    #[must_use]
    pub fn new(gateway: ApiGateway, session: SessionService) -> Self {
        let inner = Arc::new(CartInner {
            gateway,
            session: session.clone(),
            entries: RwLock::new(Vec::new()),
            mutation: Mutex::new(()),
        });

        let weak: Weak<CartInner> = Arc::downgrade(&inner);
        session.on_cleared(move || {
            if let Some(inner) = weak.upgrade() {
                inner.clear();
            }
        });

        // Populate without an explicit fetch as soon as an identity appears
        // (login or startup restore).
        let weak: Weak<CartInner> = Arc::downgrade(&inner);
        session.on_changed(move || {
            let Some(inner) = weak.upgrade() else { return };
            if inner.session.identity().is_none() {
                return;
            }
            let store = Self { inner };
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = store.fetch().await {
                        debug!(error = %e, "cart refresh after sign-in failed");
                    }
                });
            }
        });

        Self { inner }
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Replace the local cart wholesale with server truth.
    ///
    /// The canonical recovery path after any mutation; also called directly
    /// after login.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotAuthenticated`] without a session (no network call
    /// is made); otherwise the gateway's normalized failure.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Vec<CartEntry>, ClientError> {
        let ctx = self.inner.session.auth_context()?;
        self.fetch_with(&ctx).await
    }

    async fn fetch_with(&self, ctx: &AuthContext) -> Result<Vec<CartEntry>, ClientError> {
        let envelope = self
            .inner
            .gateway
            .get::<Vec<CartItemDto>>(
                &format!("/cart/{}", ctx.user_id),
                &[],
                Some(&ctx.credential),
            )
            .await;

        let entries: Vec<CartEntry> = envelope.into_data()?.into_iter().map(Into::into).collect();

        // The session this request belongs to may have ended while the call
        // was in flight; a stale result must not repopulate the cache.
        if !self.inner.session.is_current_epoch(ctx.epoch) {
            debug!("discarding stale cart fetch");
            return Err(ClientError::SessionExpired);
        }

        self.inner.replace(entries.clone());
        debug!(items = entries.len(), "cart synchronized");
        Ok(entries)
    }

    // =========================================================================
    // Mutations (each followed by a full re-fetch)
    // =========================================================================

    /// Add a book to the cart. Adding an already-present book increases its
    /// quantity server-side; the cart never grows a second entry for it.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch`], plus the backend's rejection (e.g. stock).
    #[instrument(skip(self))]
    pub async fn add(&self, book_id: BookId, quantity: u32) -> Result<(), ClientError> {
        let _guard = self.inner.mutation.lock().await;
        let ctx = self.inner.session.auth_context()?;

        let query = [
            ("userId", ctx.user_id.to_string()),
            ("bookId", book_id.to_string()),
            ("quantity", quantity.to_string()),
        ];
        self.inner
            .gateway
            .post::<serde_json::Value, ()>("/cart/add", &query, None, Some(&ctx.credential))
            .await
            .require_success()?;

        self.fetch_with(&ctx).await?;
        Ok(())
    }

    /// Remove a book from the cart.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch`].
    #[instrument(skip(self))]
    pub async fn remove(&self, book_id: BookId) -> Result<(), ClientError> {
        let _guard = self.inner.mutation.lock().await;
        let ctx = self.inner.session.auth_context()?;
        self.remove_locked(&ctx, book_id).await
    }

    /// Set the quantity for a book. A quantity of zero or below is exactly
    /// equivalent to [`Self::remove`]: same server call, same resulting
    /// state.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch`].
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        book_id: BookId,
        new_quantity: i64,
    ) -> Result<(), ClientError> {
        let _guard = self.inner.mutation.lock().await;
        let ctx = self.inner.session.auth_context()?;

        if new_quantity <= 0 {
            return self.remove_locked(&ctx, book_id).await;
        }

        let query = [
            ("userId", ctx.user_id.to_string()),
            ("bookId", book_id.to_string()),
            ("quantity", new_quantity.to_string()),
        ];
        self.inner
            .gateway
            .put::<serde_json::Value, ()>(
                "/cart/update-quantity",
                &query,
                None,
                Some(&ctx.credential),
            )
            .await
            .require_success()?;

        self.fetch_with(&ctx).await?;
        Ok(())
    }

    /// Shared removal path for `remove` and `update_quantity(<= 0)`.
    /// Caller holds the mutation lock.
    async fn remove_locked(&self, ctx: &AuthContext, book_id: BookId) -> Result<(), ClientError> {
        let query = [
            ("userId", ctx.user_id.to_string()),
            ("bookId", book_id.to_string()),
        ];
        self.inner
            .gateway
            .delete::<serde_json::Value>("/cart/remove", &query, Some(&ctx.credential))
            .await
            .require_success()?;

        self.fetch_with(ctx).await?;
        Ok(())
    }

    // =========================================================================
    // Local Views
    // =========================================================================

    /// Snapshot of the current entries.
    #[must_use]
    pub fn entries(&self) -> Vec<CartEntry> {
        self.inner.read(Clone::clone)
    }

    /// Cart total, recomputed from current entries on every call and rounded
    /// to two decimal places. `0.00` for an empty cart.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.inner.read(|entries| compute_total(entries))
    }

    /// Quantity of a book in the cart; 0 when absent.
    #[must_use]
    pub fn item_quantity(&self, book_id: BookId) -> u32 {
        self.inner.read(|entries| {
            entries
                .iter()
                .find(|e| e.book.id == book_id)
                .map_or(0, |e| e.quantity)
        })
    }

    /// Whether the local cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read(Vec::is_empty)
    }

    /// Clear the local cache only; no server call. Invoked automatically
    /// when the session identity is cleared.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl CartInner {
    fn read<T>(&self, f: impl FnOnce(&Vec<CartEntry>) -> T) -> T {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn replace(&self, entries: Vec<CartEntry>) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *guard = entries;
    }

    fn clear(&self) {
        self.replace(Vec::new());
    }
}

/// Sum of `price * quantity` over the entries, rounded to two decimals.
fn compute_total(entries: &[CartEntry]) -> Decimal {
    round_money(
        entries
            .iter()
            .map(|e| line_total(e.book.price, e.quantity))
            .sum(),
    )
}
