//! Stateless HS256 bearer tokens.
//!
//! A token moves through `Issued -> Valid (now < exp) -> Expired`. Nothing is
//! stored server side and there is no revocation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, CoreError, CoreResult, TokenError};
use crate::store::User;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier.
    pub sub: String,
    pub name: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Issues and validates tokens with a server-held secret.
///
/// The secret and lifetime are fixed at construction.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl TokenService {
    pub fn new(secret: impl Into<String>, lifetime: Duration) -> CoreResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CoreError::Token(TokenError::MissingSecret));
        }
        if lifetime.is_zero() {
            return Err(CoreError::Config("token lifetime must be positive".to_string()));
        }
        Ok(Self { secret, lifetime })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken, TokenError> {
        self.issue_at(user, now_secs())
    }

    /// Issues a token as if the current time were `now` (unix seconds).
    pub fn issue_at(&self, user: &User, now: u64) -> Result<IssuedToken, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        let expires_at = now + self.lifetime.as_secs();
        let claims = Claims {
            sub: user.identifier.clone(),
            name: user.name.clone(),
            iat: now,
            exp: expires_at,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Encode(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, now_secs())
    }

    /// Validates `token` as if the current time were `now` (unix seconds).
    pub fn validate_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against `now` with no leeway.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::MalformedToken,
        })?;

        if now >= data.claims.exp {
            return Err(AuthError::ExpiredToken);
        }

        Ok(data.claims)
    }

    /// Pulls the token out of an `Authorization` header value.
    pub fn bearer(header: Option<&str>) -> Result<&str, AuthError> {
        let token = header
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .ok_or(AuthError::MissingToken)?;

        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(token)
    }

    pub fn authenticate(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = Self::bearer(header)?;
        self.validate(token)
    }
}
