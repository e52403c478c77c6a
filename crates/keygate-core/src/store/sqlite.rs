use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::{CredentialStore, NewUser, User};
use crate::error::StoreError;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier    TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT
)";

const USER_COLUMNS: &str = "id, identifier, name, password_hash, created_at, updated_at, deleted_at";

/// Credential store on SQLite. Uniqueness comes from the `UNIQUE` column
/// constraint, not from application locking.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    ///
    /// `url` is any sqlx SQLite URL, e.g. `sqlite://keygate.db` or
    /// `sqlite::memory:`. In-memory databases live per connection, so use
    /// `max_connections = 1` for them.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(unavailable)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(unavailable)?;

        tracing::info!("credential store schema ready");
        Ok(Self { pool })
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn hydrate_user(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        identifier: row.try_get("identifier")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        deleted_at: row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")?,
    })
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE identifier = ? AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.as_ref().map(hydrate_user).transpose().map_err(unavailable)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (identifier, name, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.identifier)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(User {
                id: done.last_insert_rowid(),
                identifier: user.identifier,
                name: user.name,
                password_hash: user.password_hash,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateIdentifier(user.identifier))
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(count.max(0) as u64)
    }

    async fn find_page(&self, limit: u64, offset: u64) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter()
            .map(hydrate_user)
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteCredentialStore {
        SqliteCredentialStore::connect("sqlite::memory:", 1, Duration::from_secs(5))
            .await
            .unwrap()
    }

    fn new_user(identifier: &str) -> NewUser {
        NewUser {
            identifier: identifier.to_string(),
            name: "Someone".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        }
    }

    #[tokio::test]
    async fn create_find_and_count() {
        let store = memory_store().await;
        let created = store.create(new_user("alice")).await.unwrap();
        store.create(new_user("bob")).await.unwrap();

        let found = store.find_by_identifier("alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.password_hash, "$argon2id$placeholder");
        assert!(found.deleted_at.is_none());

        assert_eq!(store.count_all().await.unwrap(), 2);
        assert!(store.find_by_identifier("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unique_constraint_maps_to_duplicate() {
        let store = memory_store().await;
        store.create(new_user("alice")).await.unwrap();
        let err = store.create(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateIdentifier(_)));
    }

    #[tokio::test]
    async fn find_page_orders_by_id() {
        let store = memory_store().await;
        for i in 0..25 {
            store.create(new_user(&format!("user{i:02}"))).await.unwrap();
        }

        let page = store.find_page(10, 20).await.unwrap();
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].identifier, "user20");
        assert_eq!(page[4].identifier, "user24");
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_filtered() {
        let store = memory_store().await;
        store.create(new_user("alice")).await.unwrap();
        sqlx::query("UPDATE users SET deleted_at = ? WHERE identifier = 'alice'")
            .bind(Utc::now())
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(store.find_by_identifier("alice").await.unwrap().is_none());
        assert_eq!(store.count_all().await.unwrap(), 0);
        assert!(store.find_page(10, 0).await.unwrap().is_empty());
    }
}
