//! Session lifecycle: login, restore, logout, and mid-session invalidation.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use paperback_client::ClientError;
use paperback_client::models::RegisterRequest;
use paperback_client::navigation::{AccessNotice, Route};
use paperback_client::session::SessionPhase;
use paperback_core::Role;
use paperback_core::{AddressId, BookId};
use paperback_integration_tests::{
    ADMIN_EMAIL, BOOK_DUNE, BOOK_NEUROMANCER, CUSTOMER_EMAIL, PASSWORD, PENDING_VENDOR_EMAIL,
    TestContext, VENDOR_EMAIL, wait_until,
};

#[tokio::test]
async fn test_starts_anonymous_without_credential() {
    let ctx = TestContext::spawn().await;
    assert_eq!(ctx.app.session().phase(), SessionPhase::Anonymous);
    assert!(ctx.app.session().identity().is_none());
}

#[tokio::test]
async fn test_login_establishes_identity() {
    let ctx = TestContext::spawn().await;

    let identity = ctx
        .app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();

    assert_eq!(identity.role, Role::User);
    assert_eq!(identity.first_name, "Ada");
    assert_eq!(ctx.app.session().phase(), SessionPhase::Authenticated);
    assert_eq!(ctx.app.session().identity(), Some(identity));
}

#[tokio::test]
async fn test_login_rejected_leaves_state_untouched() {
    let ctx = TestContext::spawn().await;

    let err = ctx
        .app
        .session()
        .login(CUSTOMER_EMAIL, "wrong-password")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Rejected(_)));
    assert_eq!(ctx.app.session().phase(), SessionPhase::Anonymous);
    assert!(ctx.app.session().identity().is_none());
    // User-scoped calls still fail fast locally.
    assert!(matches!(
        ctx.app.cart().fetch().await,
        Err(ClientError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_restart_restores_session_from_persisted_credential() {
    let ctx = TestContext::spawn_restored(CUSTOMER_EMAIL).await;

    assert_eq!(ctx.app.session().phase(), SessionPhase::Authenticated);
    let identity = ctx.app.session().identity().unwrap();
    assert_eq!(identity.email.as_str(), CUSTOMER_EMAIL);
}

#[tokio::test]
async fn test_stale_persisted_credential_starts_anonymous() {
    let ctx = TestContext::spawn_with_stale_token().await;

    assert_eq!(ctx.app.session().phase(), SessionPhase::Anonymous);
    assert!(ctx.app.session().identity().is_none());
}

#[tokio::test]
async fn test_logout_clears_session_and_caches() {
    let ctx = TestContext::spawn().await;
    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    ctx.app.cart().add(BookId::new(BOOK_DUNE), 1).await.unwrap();
    ctx.app.navigation().navigate(Route::Cart);
    assert!(!ctx.app.cart().is_empty());

    ctx.app.session().logout();

    assert_eq!(ctx.app.session().phase(), SessionPhase::Anonymous);
    assert!(ctx.app.session().identity().is_none());
    assert!(ctx.app.cart().is_empty());
    assert!(ctx.app.wishlist().books().is_empty());
    assert!(ctx.app.orders().orders().is_empty());
    // The protected route the user was on re-resolves to login.
    assert_eq!(ctx.app.navigation().current(), Route::Login);
}

#[tokio::test]
async fn test_mid_session_invalidation_logs_out_everywhere() {
    let ctx = TestContext::spawn().await;
    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    ctx.app.cart().add(BookId::new(BOOK_DUNE), 1).await.unwrap();
    ctx.app.navigation().navigate(Route::Cart);

    // Backend expires every token behind the client's back.
    ctx.backend.revoke_all_tokens();

    let err = ctx.app.cart().fetch().await.unwrap_err();
    assert_eq!(err, ClientError::SessionExpired);

    assert_eq!(ctx.app.session().phase(), SessionPhase::Anonymous);
    assert!(ctx.app.session().identity().is_none());
    assert!(ctx.app.cart().is_empty());
    assert_eq!(ctx.app.navigation().current(), Route::Login);
}

#[tokio::test]
async fn test_login_populates_cart_and_wishlist_without_explicit_fetch() {
    let ctx = TestContext::spawn().await;

    // A previous session leaves server-side cart and wishlist state behind.
    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    ctx.app.cart().add(BookId::new(BOOK_DUNE), 2).await.unwrap();
    ctx.app
        .wishlist()
        .add(BookId::new(BOOK_NEUROMANCER))
        .await
        .unwrap();
    ctx.app.session().logout();
    assert!(ctx.app.cart().is_empty());
    assert!(ctx.app.wishlist().books().is_empty());

    // Signing back in repopulates both caches with no fetch() calls here.
    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    wait_until(|| !ctx.app.cart().is_empty() && !ctx.app.wishlist().books().is_empty()).await;

    assert_eq!(ctx.app.cart().item_quantity(BookId::new(BOOK_DUNE)), 2);
    assert!(ctx.app.wishlist().contains(BookId::new(BOOK_NEUROMANCER)));
}

#[tokio::test]
async fn test_login_populates_orders_without_explicit_fetch() {
    let ctx = TestContext::spawn().await;
    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    ctx.app.cart().add(BookId::new(BOOK_DUNE), 1).await.unwrap();
    ctx.app.orders().create(AddressId::new(1)).await.unwrap();
    ctx.app.session().logout();
    assert!(ctx.app.orders().orders().is_empty());

    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    wait_until(|| !ctx.app.orders().orders().is_empty()).await;
    assert_eq!(ctx.app.orders().orders().len(), 1);
}

#[tokio::test]
async fn test_restored_session_populates_caches_without_explicit_fetch() {
    use paperback_client::storage::MemoryCredentialStore;
    use paperback_integration_tests::FakeBackend;
    use std::sync::Arc;

    // The backend already holds cart state and a still-valid token, as if
    // the app were restarted mid-session.
    let backend = FakeBackend::new();
    backend.seed_cart(CUSTOMER_EMAIL, BOOK_DUNE, 3);
    let token = backend.issue_token_for(CUSTOMER_EMAIL);
    let storage = Arc::new(MemoryCredentialStore::with_token(&token));

    let ctx = TestContext::spawn_with(backend, storage).await;

    assert_eq!(ctx.app.session().phase(), SessionPhase::Authenticated);
    // The startup restore refreshes the stores the same way login does.
    wait_until(|| !ctx.app.cart().is_empty()).await;
    assert_eq!(ctx.app.cart().item_quantity(BookId::new(BOOK_DUNE)), 3);
}

#[tokio::test]
async fn test_relogin_after_invalidation() {
    let ctx = TestContext::spawn().await;
    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    ctx.backend.revoke_all_tokens();
    let _ = ctx.app.cart().fetch().await;
    assert_eq!(ctx.app.session().phase(), SessionPhase::Anonymous);

    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    assert_eq!(ctx.app.session().phase(), SessionPhase::Authenticated);
    assert!(ctx.app.cart().fetch().await.is_ok());
}

#[tokio::test]
async fn test_login_from_login_screen_lands_on_role_home() {
    let ctx = TestContext::spawn().await;
    ctx.app.navigation().navigate(Route::Login);

    ctx.app.session().login(ADMIN_EMAIL, PASSWORD).await.unwrap();
    assert_eq!(ctx.app.navigation().current(), Route::AdminDashboard);
}

#[tokio::test]
async fn test_approved_vendor_reaches_dashboard() {
    let ctx = TestContext::spawn().await;
    ctx.app.session().login(VENDOR_EMAIL, PASSWORD).await.unwrap();

    let resolution = ctx.app.navigation().navigate(Route::VendorDashboard);
    assert_eq!(resolution.route, Route::VendorDashboard);
    assert!(resolution.notice.is_none());
}

#[tokio::test]
async fn test_unapproved_vendor_gated_with_pending_notice() {
    let ctx = TestContext::spawn().await;
    let identity = ctx
        .app
        .session()
        .login(PENDING_VENDOR_EMAIL, PASSWORD)
        .await
        .unwrap();
    assert!(!identity.is_approved_vendor());

    let resolution = ctx.app.navigation().navigate(Route::VendorDashboard);
    assert_eq!(resolution.route, Route::Home);
    assert_eq!(resolution.notice, Some(AccessNotice::ApprovalPending));
}

#[tokio::test]
async fn test_anonymous_redirected_to_login_for_protected_route() {
    let ctx = TestContext::spawn().await;

    let resolution = ctx.app.navigation().navigate(Route::Orders);
    assert_eq!(resolution.route, Route::Login);
    assert_eq!(resolution.notice, Some(AccessNotice::SignInRequired));
}

#[tokio::test]
async fn test_register_then_login() {
    let ctx = TestContext::spawn().await;

    let request = RegisterRequest {
        email: "new@x.com".to_string(),
        password: "secret2".to_string(),
        first_name: "New".to_string(),
        last_name: "User".to_string(),
        business_name: None,
    };
    ctx.app.session().register(&request, Role::User).await.unwrap();

    // Registration does not authenticate.
    assert_eq!(ctx.app.session().phase(), SessionPhase::Anonymous);

    let identity = ctx.app.session().login("new@x.com", "secret2").await.unwrap();
    assert_eq!(identity.role, Role::User);
}

#[tokio::test]
async fn test_register_duplicate_email_rejected() {
    let ctx = TestContext::spawn().await;

    let request = RegisterRequest {
        email: CUSTOMER_EMAIL.to_string(),
        password: "secret2".to_string(),
        first_name: "Dup".to_string(),
        last_name: "User".to_string(),
        business_name: None,
    };
    let err = ctx
        .app
        .session()
        .register(&request, Role::User)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));
}

#[tokio::test]
async fn test_register_vendor_starts_unapproved() {
    let ctx = TestContext::spawn().await;

    let request = RegisterRequest {
        email: "shop@x.com".to_string(),
        password: "secret2".to_string(),
        first_name: "Shop".to_string(),
        last_name: "Owner".to_string(),
        business_name: Some("Shop of Books".to_string()),
    };
    ctx.app
        .session()
        .register(&request, Role::Vendor)
        .await
        .unwrap();

    let identity = ctx.app.session().login("shop@x.com", "secret2").await.unwrap();
    assert_eq!(identity.role, Role::Vendor);
    assert!(!identity.is_approved_vendor());
    let vendor = identity.vendor.unwrap();
    assert_eq!(vendor.business_name, "Shop of Books");
}
