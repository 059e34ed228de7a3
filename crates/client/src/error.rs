//! Client error taxonomy.
//!
//! Stores return a `Result` the caller inspects; expected failures (auth,
//! validation, transport) are never panics. The variants are deliberately
//! coarse: the UI only needs to distinguish "log in first", "the session
//! ended", "the backend said no, here is why", and "the network flaked,
//! retry".

use thiserror::Error;

/// Errors surfaced by session, store, and catalog operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A user-scoped operation was attempted with no authenticated session.
    /// Failed locally; no network call was made.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The backend rejected the credential (401). The session has already
    /// been invalidated by the gateway's auth-rejected callback.
    #[error("session expired")]
    SessionExpired,

    /// The backend rejected the operation. The message is surfaced verbatim
    /// when the backend supplied one.
    #[error("{0}")]
    Rejected(String),

    /// Network, timeout, or malformed-response failure. Recoverable by
    /// retrying the user action.
    #[error("network error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Whether this error means the caller should be redirected to login.
    #[must_use]
    pub const fn needs_login(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::SessionExpired)
    }
}
