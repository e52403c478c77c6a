use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CredentialStore, NewUser, User};
use crate::error::StoreError;

/// In-process credential store.
///
/// Uniqueness is checked and the insert performed under one write lock.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<Vec<User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a user deleted without removing the row.
    pub async fn soft_delete(&self, identifier: &str) -> bool {
        let mut users = self.users.write().await;
        match users
            .iter_mut()
            .find(|u| u.identifier == identifier && u.deleted_at.is_none())
        {
            Some(user) => {
                let now = Utc::now();
                user.deleted_at = Some(now);
                user.updated_at = now;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.identifier == identifier && u.deleted_at.is_none())
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.identifier == user.identifier) {
            return Err(StoreError::DuplicateIdentifier(user.identifier));
        }

        let now = Utc::now();
        let id = users.last().map_or(1, |u| u.id + 1);
        let stored = User {
            id,
            identifier: user.identifier,
            name: user.name,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.push(stored.clone());
        Ok(stored)
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| u.deleted_at.is_none()).count() as u64)
    }

    async fn find_page(&self, limit: u64, offset: u64) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(identifier: &str) -> NewUser {
        NewUser {
            identifier: identifier.to_string(),
            name: format!("{identifier} name"),
            password_hash: "$argon2id$placeholder".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = MemoryCredentialStore::new();
        let created = store.create(new_user("alice")).await.unwrap();
        assert_eq!(created.id, 1);

        let found = store.find_by_identifier("alice").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(store.find_by_identifier("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_identifier_is_rejected() {
        let store = MemoryCredentialStore::new();
        store.create(new_user("alice")).await.unwrap();
        let err = store.create(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateIdentifier(ref id) if id == "alice"));
        assert_eq!(store.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pages_follow_insertion_order() {
        let store = MemoryCredentialStore::new();
        for i in 0..5 {
            store.create(new_user(&format!("user{i}"))).await.unwrap();
        }

        let page = store.find_page(2, 2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|u| u.identifier.as_str()).collect();
        assert_eq!(ids, ["user2", "user3"]);

        assert!(store.find_page(2, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn soft_deleted_users_are_hidden() {
        let store = MemoryCredentialStore::new();
        store.create(new_user("alice")).await.unwrap();
        store.create(new_user("bob")).await.unwrap();

        assert!(store.soft_delete("alice").await);
        assert!(!store.soft_delete("alice").await);

        assert!(store.find_by_identifier("alice").await.unwrap().is_none());
        assert_eq!(store.count_all().await.unwrap(), 1);
        assert_eq!(store.find_page(10, 0).await.unwrap()[0].identifier, "bob");

        // The identifier stays reserved.
        assert!(store.create(new_user("alice")).await.is_err());
    }

    #[test]
    fn debug_redacts_password_hash() {
        let user = User {
            id: 1,
            identifier: "alice".to_string(),
            name: "Alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        let debug = format!("{user:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret"));
    }
}
