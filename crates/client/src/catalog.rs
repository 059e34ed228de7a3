//! Read-only book catalog client.
//!
//! The catalog is owned by the backend; no authentication is required to
//! browse it. Book lists and single books are cached for five minutes;
//! search results are never cached.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use paperback_core::BookId;

use crate::error::ClientError;
use crate::gateway::ApiGateway;
use crate::models::Book;

/// Cache time-to-live for catalog reads.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Cached catalog values.
#[derive(Clone)]
enum CacheValue {
    Book(Box<Book>),
    Books(Arc<Vec<Book>>),
}

/// Client for the public book catalog.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    gateway: ApiGateway,
    cache: Cache<String, CacheValue>,
}

impl CatalogClient {
    /// Create a new catalog client.
    #[must_use]
    pub fn new(gateway: ApiGateway) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(CatalogInner { gateway, cache }),
        }
    }

    /// List all books.
    ///
    /// # Errors
    ///
    /// Returns the gateway's normalized failure if the request fails.
    #[instrument(skip(self))]
    pub async fn list_books(&self) -> Result<Arc<Vec<Book>>, ClientError> {
        let cache_key = "books".to_string();

        if let Some(CacheValue::Books(books)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for book list");
            return Ok(books);
        }

        let envelope = self
            .inner
            .gateway
            .get::<Vec<Book>>("/books", &[], None)
            .await;
        let books = Arc::new(envelope.into_data()?);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Books(Arc::clone(&books)))
            .await;

        Ok(books)
    }

    /// Get a single book by id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] if the book does not exist, or the
    /// gateway's normalized failure.
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn get_book(&self, book_id: BookId) -> Result<Book, ClientError> {
        let cache_key = format!("book:{book_id}");

        if let Some(CacheValue::Book(book)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for book");
            return Ok(*book);
        }

        let envelope = self
            .inner
            .gateway
            .get::<Book>(&format!("/books/{book_id}"), &[], None)
            .await;
        let book = envelope.into_data()?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Book(Box::new(book.clone())))
            .await;

        Ok(book)
    }

    /// Search books by title or author. Results are not cached.
    ///
    /// # Errors
    ///
    /// Returns the gateway's normalized failure if the request fails.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<Book>, ClientError> {
        let params = [("query", query.to_string())];
        let envelope = self
            .inner
            .gateway
            .get::<Vec<Book>>("/books/search", &params, None)
            .await;
        envelope.into_data()
    }

    /// Invalidate all cached catalog data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}
