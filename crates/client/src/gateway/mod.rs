//! Remote API gateway.
//!
//! Single point of outbound HTTP calls to the bookstore backend. Every
//! response - including transport failures - is normalized into an
//! [`Envelope`], so stores inspect a value instead of catching errors.
//!
//! # Authentication
//!
//! A bearer credential is attached when the caller supplies one. When the
//! backend answers 401 the gateway invokes its registered auth-rejected
//! callback *before* returning the normalized error, so the session is
//! invalidated no matter which store made the call.
//!
//! # Conventions
//!
//! - No retries; a failed call surfaces immediately
//! - Bounded timeout from [`ClientConfig`](crate::config::ClientConfig)
//! - Every request carries a UUID v4 `x-request-id` header for correlation

mod envelope;

pub use envelope::{Envelope, FailureKind};

use std::sync::{Arc, RwLock};

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::ClientConfig;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Callback invoked when the backend rejects the credential (401).
pub type AuthRejectedHook = Arc<dyn Fn() + Send + Sync>;

/// Client for the bookstore REST API.
///
/// Cheaply cloneable; all clones share one connection pool and one
/// auth-rejected callback.
#[derive(Clone)]
pub struct ApiGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: reqwest::Client,
    /// Base URL including the `/api` prefix, without a trailing slash.
    base_url: String,
    auth_rejected: RwLock<Option<AuthRejectedHook>>,
}

impl ApiGateway {
    /// Create a new gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let base_url = config.api_base_url.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            inner: Arc::new(GatewayInner {
                client,
                base_url,
                auth_rejected: RwLock::new(None),
            }),
        })
    }

    /// Register the callback invoked on a 401 response.
    ///
    /// The session service registers itself here at wiring time; the hook
    /// clears the persisted credential and in-memory identity atomically.
    pub fn set_auth_rejected_hook(&self, hook: AuthRejectedHook) {
        if let Ok(mut slot) = self.inner.auth_rejected.write() {
            *slot = Some(hook);
        }
    }

    /// `GET` a resource.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        credential: Option<&SecretString>,
    ) -> Envelope<T> {
        self.send::<T, ()>(Method::GET, path, query, None, credential)
            .await
    }

    /// `POST` with an optional JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        credential: Option<&SecretString>,
    ) -> Envelope<T> {
        self.send(Method::POST, path, query, body, credential).await
    }

    /// `PUT` with an optional JSON body.
    pub async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        credential: Option<&SecretString>,
    ) -> Envelope<T> {
        self.send(Method::PUT, path, query, body, credential).await
    }

    /// `DELETE` a resource.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        credential: Option<&SecretString>,
    ) -> Envelope<T> {
        self.send::<T, ()>(Method::DELETE, path, query, None, credential)
            .await
    }

    /// Execute a request and normalize the response into an [`Envelope`].
    #[instrument(skip(self, query, body, credential), fields(request_id))]
    async fn send<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        credential: Option<&SecretString>,
    ) -> Envelope<T> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let url = format!("{}{path}", self.inner.base_url);

        let mut request = self
            .inner
            .client
            .request(method, &url)
            .header(REQUEST_ID_HEADER, &request_id);

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        if let Some(token) = credential {
            match HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())) {
                Ok(value) => request = request.header(AUTHORIZATION, value),
                Err(_) => {
                    return Envelope::transport_failure("credential contains invalid characters");
                }
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "request failed to complete");
                return Envelope::transport_failure(e.to_string());
            }
        };

        let status = response.status();
        let auth_rejected = status == reqwest::StatusCode::UNAUTHORIZED;

        // Invalidate the session before the caller sees the error, so every
        // store benefits from automatic logout on token expiry.
        if auth_rejected {
            warn!("credential rejected by backend, invalidating session");
            self.notify_auth_rejected();
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to read response body");
                return Envelope::transport_failure(e.to_string());
            }
        };

        // A non-2xx status with a parseable envelope still surfaces through
        // the envelope's message rather than a separate error class.
        match serde_json::from_slice::<Envelope<T>>(&bytes) {
            Ok(envelope) => {
                debug!(status = %status, success = envelope.success, "response normalized");
                if auth_rejected {
                    envelope.with_kind(FailureKind::AuthRejected)
                } else if !status.is_success() && envelope.success {
                    // Error status wins over a success flag in the body.
                    Envelope::failure(
                        envelope
                            .message
                            .unwrap_or_else(|| format!("HTTP {status}")),
                    )
                } else {
                    envelope
                }
            }
            Err(e) if status.is_success() => {
                warn!(error = %e, "malformed response body on success status");
                Envelope::transport_failure(format!("malformed response body: {e}"))
            }
            Err(_) => {
                let envelope = Envelope::failure(format!("HTTP {status}"));
                if auth_rejected {
                    envelope.with_kind(FailureKind::AuthRejected)
                } else {
                    envelope
                }
            }
        }
    }

    fn notify_auth_rejected(&self) {
        let hook = self
            .inner
            .auth_rejected
            .read()
            .ok()
            .and_then(|slot| slot.clone());
        // Run outside the lock; the hook re-enters session state.
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_gateway(base: &str) -> ApiGateway {
        let config = ClientConfig::new(base.parse().unwrap());
        ApiGateway::new(&config).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let gateway = test_gateway("http://localhost:8080/api/");
        assert_eq!(gateway.inner.base_url, "http://localhost:8080/api");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_failure() {
        // Port 9 (discard) is not listening; connection is refused locally.
        let gateway = test_gateway("http://127.0.0.1:9/api");
        let envelope: Envelope<serde_json::Value> =
            gateway.get("/books", &[], None).await;
        assert!(!envelope.success);
        assert_eq!(envelope.kind, Some(FailureKind::Transport));
    }

    #[tokio::test]
    async fn test_auth_hook_not_invoked_on_transport_failure() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let gateway = test_gateway("http://127.0.0.1:9/api");
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        gateway.set_auth_rejected_hook(Arc::new(move || {
            flag.store(true, Ordering::SeqCst);
        }));

        let _: Envelope<serde_json::Value> = gateway.get("/books", &[], None).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
