//! Registration, login and the protected user listing.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::pagination::{paginate, PageLinks, Paginated};
use crate::password::PasswordHasher;
use crate::store::{CredentialStore, NewUser, PublicUser};
use crate::token::{IssuedToken, TokenService};
use crate::validation::{LoginInput, RegisterInput};

pub const DEFAULT_MAX_PER_PAGE: i64 = 100;

/// Verified against when the identifier is unknown, so a miss costs the
/// same as a wrong password.
const DUMMY_PASSWORD: &str = "keygate-timing-equaliser";

pub struct UserService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    dummy_hash: String,
    max_per_page: i64,
}

impl UserService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
    ) -> CoreResult<Self> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            store,
            hasher,
            tokens,
            dummy_hash,
            max_per_page: DEFAULT_MAX_PER_PAGE,
        })
    }

    pub fn with_max_per_page(mut self, max_per_page: i64) -> Self {
        self.max_per_page = max_per_page.max(1);
        self
    }

    async fn hash_blocking(&self, password: String) -> CoreResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| CoreError::Hashing(e.to_string()))?
    }

    async fn verify_blocking(&self, password: String, hash: String) -> CoreResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| CoreError::Hashing(e.to_string()))
    }

    pub async fn register(&self, input: RegisterInput) -> CoreResult<PublicUser> {
        input.validate()?;

        let password_hash = self.hash_blocking(input.password).await?;
        let user = self
            .store
            .create(NewUser {
                identifier: input.identifier,
                name: input.name,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = user.id, identifier = %user.identifier, "user registered");
        Ok(PublicUser::from(user))
    }

    /// Verifies credentials and issues a token. Unknown identifiers and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn login(&self, input: LoginInput) -> CoreResult<IssuedToken> {
        input.validate()?;

        let user = self.store.find_by_identifier(&input.identifier).await?;
        let hash = user
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |u| u.password_hash.clone());
        let valid = self.verify_blocking(input.password, hash).await?;

        match user {
            Some(user) if valid => {
                let issued = self.tokens.issue(&user)?;
                tracing::info!(identifier = %user.identifier, "login succeeded");
                Ok(issued)
            }
            _ => {
                tracing::warn!(identifier = %input.identifier, "failed login attempt");
                Err(CoreError::InvalidCredentials)
            }
        }
    }

    /// Lists active users. `per_page` is capped at the configured maximum.
    pub async fn list_users(
        &self,
        page: i64,
        per_page: i64,
        base_path: &str,
    ) -> CoreResult<Paginated<PublicUser>> {
        let total = self.store.count_all().await?;
        let meta = paginate(total, page, per_page.min(self.max_per_page));

        let data = if meta.offset < total {
            self.store
                .find_page(meta.items_per_page, meta.offset)
                .await?
                .into_iter()
                .map(PublicUser::from)
                .collect()
        } else {
            Vec::new()
        };

        Ok(Paginated {
            data,
            links: PageLinks::build(base_path, &meta),
            pagination: meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::StoreError;
    use crate::password::cheap_hasher;
    use crate::store::{MemoryCredentialStore, User};
    use async_trait::async_trait;

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new("service-test-secret-0123456789abcdef", Duration::from_secs(72 * 3600)).unwrap())
    }

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryCredentialStore::new()), cheap_hasher(), tokens()).unwrap()
    }

    fn register_input(identifier: &str, password: &str) -> RegisterInput {
        RegisterInput {
            name: "Test User".to_string(),
            identifier: identifier.to_string(),
            password: password.to_string(),
        }
    }

    fn login_input(identifier: &str, password: &str) -> LoginInput {
        LoginInput {
            identifier: identifier.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let svc = service();
        let user = svc.register(register_input("alice", "wonderland1")).await.unwrap();
        assert_eq!(user.identifier, "alice");

        let issued = svc.login(login_input("alice", "wonderland1")).await.unwrap();
        let claims = svc.tokens.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.name, "Test User");
    }

    #[tokio::test]
    async fn stored_hash_verifies_only_the_registered_password() {
        let store = Arc::new(MemoryCredentialStore::new());
        let svc = UserService::new(store.clone(), cheap_hasher(), tokens()).unwrap();
        svc.register(register_input("alice", "wonderland1")).await.unwrap();

        let stored = store.find_by_identifier("alice").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "wonderland1");
        assert!(svc.hasher.verify("wonderland1", &stored.password_hash));
        assert!(!svc.hasher.verify("wonderland2", &stored.password_hash));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let svc = service();
        svc.register(register_input("alice", "wonderland1")).await.unwrap();

        let wrong = svc.login(login_input("alice", "looking-glass")).await.unwrap_err();
        let unknown = svc.login(login_input("mallory", "wonderland1")).await.unwrap_err();
        assert!(matches!(wrong, CoreError::InvalidCredentials));
        assert!(matches!(unknown, CoreError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_field_error() {
        let svc = service();
        svc.register(register_input("alice", "wonderland1")).await.unwrap();
        match svc.register(register_input("alice", "other-pass1")).await {
            Err(CoreError::Validation(errors)) => assert_eq!(errors[0].rule, "unique"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_store() {
        let svc = service();
        let err = svc.register(register_input("al", "short")).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(svc.store.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_users_pages_through_the_store() {
        let svc = service();
        for i in 0..25 {
            svc.register(register_input(&format!("user{i:02}"), "wonderland1"))
                .await
                .unwrap();
        }

        let page = svc.list_users(3, 10, "/api/v1/users").await.unwrap();
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.data[0].identifier, "user20");
        assert_eq!(page.pagination.total_pages, 3);
        assert!(!page.pagination.has_next_page);
        assert!(page.pagination.has_previous_page);
        assert_eq!(page.links.prev.as_deref(), Some("/api/v1/users?page=2&per_page=10"));
    }

    #[tokio::test]
    async fn per_page_is_capped() {
        let svc = service().with_max_per_page(5);
        for i in 0..8 {
            svc.register(register_input(&format!("user{i}"), "wonderland1"))
                .await
                .unwrap();
        }
        let page = svc.list_users(1, 1000, "/u").await.unwrap();
        assert_eq!(page.pagination.items_per_page, 5);
        assert_eq!(page.data.len(), 5);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let svc = service();
        svc.register(register_input("alice", "wonderland1")).await.unwrap();
        let page = svc.list_users(9, 10, "/u").await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total_items, 1);
    }

    struct DownStore;

    #[async_trait]
    impl CredentialStore for DownStore {
        async fn find_by_identifier(&self, _: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }
        async fn create(&self, _: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }
        async fn count_all(&self) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }
        async fn find_page(&self, _: u64, _: u64) -> Result<Vec<User>, StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn store_outage_is_not_an_auth_failure() {
        let svc = UserService::new(Arc::new(DownStore), cheap_hasher(), tokens()).unwrap();
        let err = svc.login(login_input("alice", "wonderland1")).await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));

        let err = svc.list_users(1, 10, "/u").await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
    }
}
