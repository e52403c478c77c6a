//! keygate core library: HTTP-agnostic access control.
//!
//! `keygate-core` holds every piece of the access pipeline that has real
//! invariants. It knows nothing about HTTP, so the server crate
//! (`keygate-web`) only maps requests in and statuses out.
//!
//! # Modules
//!
//! - [`password`]: Argon2id hashing with configurable cost.
//! - [`token`]: HS256 bearer tokens: issue, validate, `Authorization` parsing.
//! - [`rate_limit`]: Fixed-window [`RateLimiter`] over a pluggable [`CounterStore`] (memory, Redis).
//! - [`pagination`]: Page metadata and navigation links.
//! - [`store`]: The [`CredentialStore`] trait plus memory and SQLite backends.
//! - [`validation`]: Field rules for registration and login input.
//! - [`service`]: [`UserService`]: register, login, list.
//! - [`error`]: Error types ([`CoreError`], [`AuthError`]) and [`CoreResult`].

pub mod error;
pub mod pagination;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod store;
pub mod token;
pub mod validation;

pub use error::{AuthError, CoreError, CoreResult, FieldError, StoreError, TokenError};
pub use pagination::{paginate, PageLinks, PageMeta, Paginated};
pub use password::{HashCost, PasswordHasher};
pub use rate_limit::{
    Admission, CounterStore, CounterStoreError, Denial, KeyStrategy, MemoryCounterStore,
    RateLimiter, RedisCounterStore, WindowState,
};
pub use service::UserService;
pub use store::{
    CredentialStore, MemoryCredentialStore, NewUser, PublicUser, SqliteCredentialStore, User,
};
pub use token::{Claims, IssuedToken, TokenService};
pub use validation::{LoginInput, RegisterInput};
