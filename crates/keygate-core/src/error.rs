//! Error types for `keygate-core`.
//!
//! Fallible service operations return [`CoreResult<T>`], an alias for
//! `Result<T, CoreError>`. Component-level failures ([`AuthError`],
//! [`TokenError`], [`StoreError`]) convert into [`CoreError`] with `?`.

use serde::Serialize;

/// A single rejected input field.
///
/// The submitted value is deliberately not carried, so passwords never end
/// up in a response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub rule: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &str, rule: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why a presented bearer credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No usable credential: header absent, wrong scheme, or empty token.
    #[error("missing bearer token")]
    MissingToken,

    /// Structure, algorithm or signature did not verify.
    #[error("malformed token")]
    MalformedToken,

    /// Signature verified but `exp` has passed.
    #[error("token expired")]
    ExpiredToken,
}

/// Failures while minting a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signing secret is not configured")]
    MissingSecret,

    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// Failures reported by a [`CredentialStore`](crate::store::CredentialStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another user already owns this identifier.
    #[error("identifier already registered: {0}")]
    DuplicateIdentifier(String),

    /// The backing store could not be reached or failed mid-operation.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Unified error type for service-level operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// One or more input fields failed validation.
    #[error("validation failed ({} field(s))", .0.len())]
    Validation(Vec<FieldError>),

    /// Unknown identifier or wrong password. Callers must not be told which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// A dependency (credential store, counter store) is unreachable.
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    /// Password hashing failed for reasons other than a mismatch.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// Invalid construction parameters.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateIdentifier(_) => CoreError::Validation(vec![FieldError::new(
                "identifier",
                "unique",
                "This identifier is already registered",
            )]),
            StoreError::Unavailable(msg) => CoreError::Unavailable(msg),
        }
    }
}

/// Convenience alias used throughout `keygate-core`.
pub type CoreResult<T> = Result<T, CoreError>;
