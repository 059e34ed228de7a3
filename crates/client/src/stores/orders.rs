//! Orders store and checkout.
//!
//! Order creation invalidates two aggregates at once: the new order appears
//! in the order list and the purchased items leave the cart. Both are
//! re-fetched before the call reports completion, so a caller never
//! observes one updated without the other.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use paperback_core::AddressId;

use crate::error::ClientError;
use crate::gateway::ApiGateway;
use crate::models::Order;
use crate::session::{AuthContext, SessionService};
use crate::stores::CartStore;

struct OrderInner {
    gateway: ApiGateway,
    session: SessionService,
    cart: CartStore,
    orders: RwLock<Vec<Order>>,
    mutation: Mutex<()>,
}

/// Client-side cache of the user's placed orders.
#[derive(Clone)]
pub struct OrderStore {
    inner: Arc<OrderInner>,
}

impl OrderStore {
    /// Create the store. Holds a cart handle so checkout can re-synchronize
    /// both aggregates.
    #[must_use]
    pub fn new(gateway: ApiGateway, session: SessionService, cart: CartStore) -> Self {
        let inner = Arc::new(OrderInner {
            gateway,
            session: session.clone(),
            cart,
            orders: RwLock::new(Vec::new()),
            mutation: Mutex::new(()),
        });

        let weak: Weak<OrderInner> = Arc::downgrade(&inner);
        session.on_cleared(move || {
            if let Some(inner) = weak.upgrade() {
                inner.clear();
            }
        });

        // Populate without an explicit fetch as soon as an identity appears.
        let weak: Weak<OrderInner> = Arc::downgrade(&inner);
        session.on_changed(move || {
            let Some(inner) = weak.upgrade() else { return };
            if inner.session.identity().is_none() {
                return;
            }
            let store = Self { inner };
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = store.fetch().await {
                        debug!(error = %e, "orders refresh after sign-in failed");
                    }
                });
            }
        });

        Self { inner }
    }

    /// Place an order for the current cart contents, shipped to the given
    /// address.
    ///
    /// On success both the orders list and the cart are re-fetched before
    /// returning, so the caller observes the post-checkout state of both.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotAuthenticated`] without a session;
    /// [`ClientError::Rejected`] with the backend's message (empty cart,
    /// invalid address, insufficient stock); transport failures.
    #[instrument(skip(self))]
    pub async fn create(&self, address_id: AddressId) -> Result<Order, ClientError> {
        let _guard = self.inner.mutation.lock().await;
        let ctx = self.inner.session.auth_context()?;

        let query = [
            ("userId", ctx.user_id.to_string()),
            ("addressId", address_id.to_string()),
        ];
        let envelope = self
            .inner
            .gateway
            .post::<Order, ()>("/orders/create", &query, None, Some(&ctx.credential))
            .await;
        let order = envelope.into_data()?;

        info!(order_id = %order.id, "order placed");

        // Both affected aggregates re-synchronize before completion is
        // reported (the cart is expected to come back empty or reduced).
        self.fetch_with(&ctx).await?;
        self.inner.cart.fetch().await?;

        Ok(order)
    }

    /// Replace the local order list wholesale with server truth.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotAuthenticated`] without a session (no network call
    /// is made); otherwise the gateway's normalized failure.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Vec<Order>, ClientError> {
        let ctx = self.inner.session.auth_context()?;
        self.fetch_with(&ctx).await
    }

    async fn fetch_with(&self, ctx: &AuthContext) -> Result<Vec<Order>, ClientError> {
        let envelope = self
            .inner
            .gateway
            .get::<Vec<Order>>(
                &format!("/orders/user/{}", ctx.user_id),
                &[],
                Some(&ctx.credential),
            )
            .await;

        let orders = envelope.into_data()?;

        if !self.inner.session.is_current_epoch(ctx.epoch) {
            debug!("discarding stale orders fetch");
            return Err(ClientError::SessionExpired);
        }

        self.inner.replace(orders.clone());
        debug!(orders = orders.len(), "orders synchronized");
        Ok(orders)
    }

    /// Snapshot of the cached orders.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.inner.read(Clone::clone)
    }

    /// Clear the local cache only; no server call. Invoked automatically
    /// when the session identity is cleared.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl OrderInner {
    fn read<T>(&self, f: impl FnOnce(&Vec<Order>) -> T) -> T {
        let guard = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn replace(&self, orders: Vec<Order>) {
        let mut guard = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        *guard = orders;
    }

    fn clear(&self) {
        self.replace(Vec::new());
    }
}
