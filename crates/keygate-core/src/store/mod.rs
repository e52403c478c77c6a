//! Durable user records.
//!
//! The core only talks to users through [`CredentialStore`]. Any backend
//! that can enforce identifier uniqueness can implement it:
//!
//! - [`MemoryCredentialStore`] for tests and single-process development.
//! - [`SqliteCredentialStore`] backed by `sqlx`.

pub mod memory;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;

pub use memory::MemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;

/// A stored user, including the password hash.
///
/// Intentionally not `Serialize`; convert to [`PublicUser`] before anything
/// leaves the process.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("name", &self.name)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("deleted_at", &self.deleted_at)
            .finish()
    }
}

/// Fields supplied at registration, after hashing.
#[derive(Clone)]
pub struct NewUser {
    pub identifier: String,
    pub name: String,
    pub password_hash: String,
}

/// Outward view of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            identifier: user.identifier.clone(),
            name: user.name.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser::from(&user)
    }
}

/// Repository of user identities and password hashes.
///
/// Soft-deleted users are invisible to every lookup. Pages are ordered by
/// `id` so offsets stay stable while users are appended.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a user. Fails with [`StoreError::DuplicateIdentifier`] if the
    /// identifier is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn count_all(&self) -> Result<u64, StoreError>;

    async fn find_page(&self, limit: u64, offset: u64) -> Result<Vec<User>, StoreError>;
}
