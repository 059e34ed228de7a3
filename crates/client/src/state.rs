//! Application state.
//!
//! Wires the gateway, session, stores, catalog and navigation together and
//! hands out cheap clones. Construction order matters: the session must
//! exist before the stores so their cache-clear hooks are registered before
//! any identity transition can fire.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::catalog::CatalogClient;
use crate::config::ClientConfig;
use crate::gateway::ApiGateway;
use crate::navigation::NavigationController;
use crate::session::{SessionPhase, SessionService};
use crate::storage::CredentialStore;
use crate::stores::{CartStore, OrderStore, WishlistStore};

/// Failure to assemble the application state.
#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

struct AppInner {
    config: ClientConfig,
    gateway: ApiGateway,
    session: SessionService,
    cart: CartStore,
    wishlist: WishlistStore,
    orders: OrderStore,
    catalog: CatalogClient,
    navigation: NavigationController,
}

/// Shared application state. Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

impl AppState {
    /// Assemble the full client graph against one backend.
    ///
    /// # Errors
    ///
    /// Returns [`AppInitError::Http`] if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn CredentialStore>,
    ) -> Result<Self, AppInitError> {
        let gateway = ApiGateway::new(&config)?;
        let session = SessionService::new(gateway.clone(), storage);
        let cart = CartStore::new(gateway.clone(), session.clone());
        let wishlist = WishlistStore::new(gateway.clone(), session.clone());
        let orders = OrderStore::new(gateway.clone(), session.clone(), cart.clone());
        let catalog = CatalogClient::new(gateway.clone());
        let navigation = NavigationController::new(session.clone());

        Ok(Self {
            inner: Arc::new(AppInner {
                config,
                gateway,
                session,
                cart,
                wishlist,
                orders,
                catalog,
                navigation,
            }),
        })
    }

    /// Resolve the startup session state from persisted credentials.
    ///
    /// Must complete before user-scoped fetches are issued; never errors.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionPhase {
        self.inner.session.initialize().await
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn gateway(&self) -> &ApiGateway {
        &self.inner.gateway
    }

    #[must_use]
    pub fn session(&self) -> &SessionService {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn orders(&self) -> &OrderStore {
        &self.inner.orders
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    #[must_use]
    pub fn navigation(&self) -> &NavigationController {
        &self.inner.navigation
    }
}
