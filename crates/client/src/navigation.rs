//! Role-gated navigation.
//!
//! Route access is resolved from a [`SessionView`] snapshot by a pure
//! function, so every gating rule is unit-testable without a backend. The
//! [`NavigationController`] layers the stateful part on top: it tracks the
//! current route and re-resolves it whenever the session identity changes,
//! so a mid-session invalidation bounces the user off a protected screen
//! without any screen-level polling.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, instrument};

use paperback_core::{BookId, Role};

use crate::session::{SessionService, SessionView};

// =============================================================================
// Routes
// =============================================================================

/// Navigable screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    BookDetails(BookId),
    Cart,
    Wishlist,
    Checkout,
    Orders,
    Profile,
    VendorDashboard,
    AdminDashboard,
}

impl Route {
    /// Whether the route requires an authenticated session.
    #[must_use]
    pub const fn requires_auth(self) -> bool {
        match self {
            Self::Home | Self::Login | Self::Register | Self::BookDetails(_) => false,
            Self::Cart
            | Self::Wishlist
            | Self::Checkout
            | Self::Orders
            | Self::Profile
            | Self::VendorDashboard
            | Self::AdminDashboard => true,
        }
    }

    /// The role the route is restricted to, if any.
    #[must_use]
    pub const fn required_role(self) -> Option<Role> {
        match self {
            Self::VendorDashboard => Some(Role::Vendor),
            Self::AdminDashboard => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Why a navigation attempt was redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessNotice {
    /// The target needs a session; the user was sent to login.
    SignInRequired,
    /// The user's role does not grant the target.
    AccessDenied,
    /// The vendor account exists but has not been approved yet.
    ApprovalPending,
}

/// Outcome of resolving a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The route actually landed on.
    pub route: Route,
    /// Set when the landing route differs from the requested one.
    pub notice: Option<AccessNotice>,
}

impl Resolution {
    const fn granted(route: Route) -> Self {
        Self {
            route,
            notice: None,
        }
    }

    const fn redirected(route: Route, notice: AccessNotice) -> Self {
        Self {
            route,
            notice: Some(notice),
        }
    }
}

/// Resolve a navigation attempt against a session snapshot.
///
/// Unauthenticated access to a protected route lands on [`Route::Login`];
/// a role mismatch lands on [`Route::Home`]. A vendor whose account is not
/// yet approved is kept off the vendor dashboard with
/// [`AccessNotice::ApprovalPending`].
#[must_use]
pub fn resolve(target: Route, view: &SessionView) -> Resolution {
    if !target.requires_auth() {
        return Resolution::granted(target);
    }

    let Some(identity) = &view.identity else {
        return Resolution::redirected(Route::Login, AccessNotice::SignInRequired);
    };

    match target.required_role() {
        Some(required) if identity.role != required => {
            Resolution::redirected(Route::Home, AccessNotice::AccessDenied)
        }
        Some(Role::Vendor) if !identity.is_approved_vendor() => {
            Resolution::redirected(Route::Home, AccessNotice::ApprovalPending)
        }
        _ => Resolution::granted(target),
    }
}

/// The landing route for an identity after login.
#[must_use]
pub fn role_home(view: &SessionView) -> Route {
    match &view.identity {
        Some(identity) if identity.role == Role::Admin => Route::AdminDashboard,
        Some(identity) if identity.is_approved_vendor() => Route::VendorDashboard,
        _ => Route::Home,
    }
}

// =============================================================================
// Controller
// =============================================================================

struct NavigationInner {
    session: SessionService,
    current: RwLock<Route>,
}

/// Tracks the current route and keeps it consistent with the session.
#[derive(Clone)]
pub struct NavigationController {
    inner: Arc<NavigationInner>,
}

impl NavigationController {
    /// Create the controller, starting on [`Route::Home`], and register
    /// session observers that re-resolve the current route on identity
    /// transitions.
    #[must_use]
    pub fn new(session: SessionService) -> Self {
        let inner = Arc::new(NavigationInner {
            session: session.clone(),
            current: RwLock::new(Route::Home),
        });

        let weak: Weak<NavigationInner> = Arc::downgrade(&inner);
        session.on_changed(move || {
            if let Some(inner) = weak.upgrade() {
                inner.reresolve();
            }
        });

        Self { inner }
    }

    /// Navigate to `target`, landing wherever the gating rules allow.
    #[instrument(skip(self))]
    pub fn navigate(&self, target: Route) -> Resolution {
        let view = self.inner.session.view();
        let resolution = resolve(target, &view);
        if resolution.route != target {
            debug!(?target, landed = ?resolution.route, "navigation redirected");
        }
        self.inner.set_current(resolution.route);
        resolution
    }

    /// The route currently landed on.
    #[must_use]
    pub fn current(&self) -> Route {
        let guard = self
            .inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

impl NavigationInner {
    fn set_current(&self, route: Route) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = route;
    }

    /// Re-check the current route after an identity transition.
    ///
    /// A session clear while on a protected route lands on login; a fresh
    /// login while sitting on the login screen lands on the role's home.
    fn reresolve(&self) {
        let view = self.session.view();
        let current = {
            let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
            *guard
        };

        let next = if current == Route::Login && view.identity.is_some() {
            role_home(&view)
        } else {
            resolve(current, &view).route
        };

        if next != current {
            debug!(from = ?current, to = ?next, "route re-resolved after session change");
            self.set_current(next);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{Identity, VendorInfo};
    use crate::session::SessionPhase;
    use paperback_core::{Email, UserId, VendorId};

    fn anonymous() -> SessionView {
        SessionView {
            phase: SessionPhase::Anonymous,
            identity: None,
        }
    }

    fn authenticated(role: Role, vendor: Option<VendorInfo>) -> SessionView {
        SessionView {
            phase: SessionPhase::Authenticated,
            identity: Some(Identity {
                id: UserId::new(1),
                email: Email::parse("a@x.com").unwrap(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                role,
                vendor,
            }),
        }
    }

    fn vendor(approved: bool) -> SessionView {
        authenticated(
            Role::Vendor,
            Some(VendorInfo {
                id: VendorId::new(7),
                business_name: "Books & Co".to_string(),
                approved,
            }),
        )
    }

    #[test]
    fn test_public_routes_open_to_anonymous() {
        let view = anonymous();
        for route in [Route::Home, Route::Login, Route::BookDetails(BookId::new(1))] {
            assert_eq!(resolve(route, &view), Resolution::granted(route));
        }
    }

    #[test]
    fn test_protected_route_redirects_anonymous_to_login() {
        let resolution = resolve(Route::Cart, &anonymous());
        assert_eq!(resolution.route, Route::Login);
        assert_eq!(resolution.notice, Some(AccessNotice::SignInRequired));
    }

    #[test]
    fn test_customer_denied_admin_dashboard() {
        let resolution = resolve(Route::AdminDashboard, &authenticated(Role::User, None));
        assert_eq!(resolution.route, Route::Home);
        assert_eq!(resolution.notice, Some(AccessNotice::AccessDenied));
    }

    #[test]
    fn test_admin_denied_vendor_dashboard() {
        let resolution = resolve(Route::VendorDashboard, &authenticated(Role::Admin, None));
        assert_eq!(resolution.notice, Some(AccessNotice::AccessDenied));
    }

    #[test]
    fn test_unapproved_vendor_kept_off_dashboard() {
        let resolution = resolve(Route::VendorDashboard, &vendor(false));
        assert_eq!(resolution.route, Route::Home);
        assert_eq!(resolution.notice, Some(AccessNotice::ApprovalPending));
    }

    #[test]
    fn test_approved_vendor_reaches_dashboard() {
        let resolution = resolve(Route::VendorDashboard, &vendor(true));
        assert_eq!(resolution, Resolution::granted(Route::VendorDashboard));
    }

    #[test]
    fn test_customer_reaches_cart() {
        let resolution = resolve(Route::Cart, &authenticated(Role::User, None));
        assert_eq!(resolution, Resolution::granted(Route::Cart));
    }

    #[test]
    fn test_role_home_mapping() {
        assert_eq!(role_home(&anonymous()), Route::Home);
        assert_eq!(role_home(&authenticated(Role::User, None)), Route::Home);
        assert_eq!(
            role_home(&authenticated(Role::Admin, None)),
            Route::AdminDashboard
        );
        assert_eq!(role_home(&vendor(true)), Route::VendorDashboard);
        assert_eq!(role_home(&vendor(false)), Route::Home);
    }
}
