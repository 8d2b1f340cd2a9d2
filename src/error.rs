//! Error types.
//!
//! None of these cross the public surface as a fatal error: network and
//! dialog failures are handed to listeners, store failures are logged and
//! the engine stays in its last committed state.

use thiserror::Error;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored value for {key} failed its integrity check")]
    Corrupt { key: String },
}

/// Transport and response-parsing failures, each with a stable reason code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("Bad response body: {0}")]
    BadBody(String),

    #[error("No connection")]
    NoConnection,

    #[error("Rate limited")]
    RateLimited,

    #[error("Unspecified network error: {0}")]
    Unspecified(String),
}

impl NetworkError {
    /// Stable code used in logs and by hosts that map errors to telemetry.
    pub fn reason_code(&self) -> &'static str {
        match self {
            NetworkError::BadBody(_) => "bad_body",
            NetworkError::NoConnection => "no_connection",
            NetworkError::RateLimited => "rate_limited",
            NetworkError::Unspecified(_) => "unspecified",
        }
    }
}

/// Consent prompt failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogError {
    #[error("Consent dialog is not loaded")]
    NotReady,

    #[error("Consent dialog payload was empty")]
    EmptyPayload,

    #[error("Presentation layer refused the dialog")]
    PresentationRefused,

    #[error("Consent dialog is not needed in the current state")]
    NotNeeded,

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl DialogError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            DialogError::NotReady => "not_ready",
            DialogError::EmptyPayload => "empty_payload",
            DialogError::PresentationRefused => "presentation_refused",
            DialogError::NotNeeded => "not_needed",
            DialogError::Network(e) => e.reason_code(),
        }
    }
}
