//! Error classification for the session and asset pipeline.
//!
//! [`TransportError`] and [`ApiError`] are raised by [`crate::core::transport`]
//! on every HTTP round trip; [`ApiError::classify`] sorts the provider's
//! opaque JSON error envelope into the three buckets the retry state
//! machines in [`crate::core::auth`] and [`crate::core::download`] actually
//! branch on.

use thiserror::Error;

/// A request never reached the provider, or its response never completed
/// (DNS, TCP, TLS, a reset read). Always retryable.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(#[from] pub reqwest::Error);

/// The provider responded with a recognized JSON error envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("api error ({code:?}): {reason}")]
pub struct ApiError {
    pub reason: String,
    pub code: Option<String>,
}

/// Classification of an [`ApiError`], used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The session cookie jar is no longer accepted; re-authenticate.
    SessionInvalid,
    /// Transient failure on the provider's side; retry with backoff.
    InternalServerError,
    /// Anything else: not retried by the classification layer itself.
    Other,
}

impl ApiError {
    pub fn classify(&self) -> ErrorClass {
        if self.reason == "Invalid global session" || self.code.as_deref() == Some("100") {
            return ErrorClass::SessionInvalid;
        }
        let starts_with_internal_error =
            self.reason.starts_with("INTERNAL_ERROR") || self.code.as_deref().is_some_and(|c| c.starts_with("INTERNAL_ERROR"));
        if starts_with_internal_error {
            return ErrorClass::InternalServerError;
        }
        ErrorClass::Other
    }
}

/// Unified error type surfaced by the session/transport layer.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            SessionError::Transport(_) => ErrorClass::Other,
            SessionError::Api(api) => api.classify(),
        }
    }
}

/// Fatal, run-ending errors: authentication could not be established or an
/// unrecoverable listing failure occurred.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no stored session and no password available; a terminal is required to authenticate interactively")]
    RequiresInteractive,
    #[error("invalid username or password")]
    LoginRejected,
    #[error("iCloud re-authentication failed. Please try again later.")]
    ReauthExhausted,
    #[error("Internal Error at Apple.")]
    InternalErrorExhausted,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
