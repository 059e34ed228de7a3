//! The `{success, data, message}` response envelope.

use serde::Deserialize;

use crate::error::ClientError;

/// How a failure envelope came to be, when the gateway synthesized or
/// annotated it locally. Not part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network, timeout, or malformed-body failure; no backend verdict.
    Transport,
    /// The backend rejected the credential (401).
    AuthRejected,
}

/// Normalized backend response.
///
/// Every call through the gateway resolves to one of these. Transport
/// failures become `{ success: false, message }` with
/// [`FailureKind::Transport`] attached, so callers handle one shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(skip)]
    pub kind: Option<FailureKind>,
}

impl<T> Envelope<T> {
    /// A failure envelope carrying a backend (or synthesized) message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            kind: None,
        }
    }

    /// A failure envelope for a transport-level problem.
    #[must_use]
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::failure(message).with_kind(FailureKind::Transport)
    }

    /// Attach a local failure kind.
    #[must_use]
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// The human-readable message, or a generic fallback.
    #[must_use]
    pub fn message_or_default(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "request failed".to_string())
    }

    /// Convert into the payload, mapping failures onto [`ClientError`].
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] for transport-kind failures
    /// - [`ClientError::SessionExpired`] when the credential was rejected
    /// - [`ClientError::Rejected`] for backend failures, and for a success
    ///   envelope that is missing its payload
    pub fn into_data(self) -> Result<T, ClientError> {
        match self.kind {
            Some(FailureKind::Transport) => Err(ClientError::Transport(self.message_or_default())),
            Some(FailureKind::AuthRejected) => Err(ClientError::SessionExpired),
            None => {
                if self.success {
                    let message = self.message_or_default();
                    self.data
                        .ok_or(ClientError::Rejected(format!(
                            "response missing data: {message}"
                        )))
                } else {
                    Err(ClientError::Rejected(self.message_or_default()))
                }
            }
        }
    }

    /// Require success, discarding any payload.
    ///
    /// For mutations whose payload the caller ignores because it re-fetches
    /// authoritative state afterwards.
    ///
    /// # Errors
    ///
    /// Same mapping as [`Self::into_data`], minus the missing-payload case.
    pub fn require_success(self) -> Result<(), ClientError> {
        match self.kind {
            Some(FailureKind::Transport) => Err(ClientError::Transport(self.message_or_default())),
            Some(FailureKind::AuthRejected) => Err(ClientError::SessionExpired),
            None if self.success => Ok(()),
            None => Err(ClientError::Rejected(self.message_or_default())),
        }
    }
}
