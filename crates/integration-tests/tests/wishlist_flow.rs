//! Wishlist set semantics and the public catalog.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use paperback_client::ClientError;
use paperback_core::BookId;
use paperback_integration_tests::{
    BOOK_DUNE, BOOK_NEUROMANCER, CUSTOMER_EMAIL, PASSWORD, TestContext,
};

async fn logged_in() -> TestContext {
    let ctx = TestContext::spawn().await;
    ctx.app
        .session()
        .login(CUSTOMER_EMAIL, PASSWORD)
        .await
        .unwrap();
    ctx
}

#[tokio::test]
async fn test_add_and_contains() {
    let ctx = logged_in().await;

    ctx.app.wishlist().add(BookId::new(BOOK_DUNE)).await.unwrap();

    assert!(ctx.app.wishlist().contains(BookId::new(BOOK_DUNE)));
    assert!(!ctx.app.wishlist().contains(BookId::new(BOOK_NEUROMANCER)));
}

#[tokio::test]
async fn test_adding_same_book_twice_keeps_single_entry() {
    let ctx = logged_in().await;

    ctx.app.wishlist().add(BookId::new(BOOK_DUNE)).await.unwrap();
    ctx.app.wishlist().add(BookId::new(BOOK_DUNE)).await.unwrap();

    assert_eq!(ctx.app.wishlist().books().len(), 1);
}

#[tokio::test]
async fn test_remove() {
    let ctx = logged_in().await;
    ctx.app.wishlist().add(BookId::new(BOOK_DUNE)).await.unwrap();

    ctx.app
        .wishlist()
        .remove(BookId::new(BOOK_DUNE))
        .await
        .unwrap();

    assert!(ctx.app.wishlist().books().is_empty());
}

#[tokio::test]
async fn test_wishlist_fails_fast_without_session() {
    let ctx = TestContext::spawn().await;

    assert!(matches!(
        ctx.app.wishlist().add(BookId::new(BOOK_DUNE)).await,
        Err(ClientError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_catalog_is_public() {
    let ctx = TestContext::spawn().await;

    let books = ctx.app.catalog().list_books().await.unwrap();
    assert_eq!(books.len(), 3);

    let dune = ctx.app.catalog().get_book(BookId::new(BOOK_DUNE)).await.unwrap();
    assert_eq!(dune.title, "Dune");
    assert_eq!(dune.stock_quantity, 10);
}

#[tokio::test]
async fn test_catalog_search_matches_title_and_author() {
    let ctx = TestContext::spawn().await;

    let by_author = ctx.app.catalog().search("gibson").await.unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].title, "Neuromancer");

    let none = ctx.app.catalog().search("tolkien").await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_missing_book_is_rejected() {
    let ctx = TestContext::spawn().await;

    let err = ctx
        .app
        .catalog()
        .get_book(BookId::new(99999))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));
}
