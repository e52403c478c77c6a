use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use keygate_core::{HashCost, KeyStrategy};
use serde::Deserialize;

const MIN_TTL_HOURS: u64 = 24;
const MAX_TTL_HOURS: u64 = 72;

const WEAK_SECRETS: &[&str] = &[
    "change-me-to-a-random-secret",
    "secret",
    "password",
    "jwt-secret",
    "changeme",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub counter_store: CounterStoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_ttl_hours")]
    pub jwt_ttl_hours: u64,
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl_hours", &self.jwt_ttl_hours)
            .field("hash_memory_kib", &self.hash_memory_kib)
            .field("hash_iterations", &self.hash_iterations)
            .field("hash_parallelism", &self.hash_parallelism)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default)]
    pub key_strategy: KeyStrategy,
    /// Admit requests when the counter store cannot be reached.
    #[serde(default)]
    pub fail_open: bool,
    /// Use `X-Forwarded-For` / `X-Real-IP` as the client address. Only
    /// enable behind a proxy that overwrites them.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CounterStoreConfig {
    #[serde(default)]
    pub backend: CounterBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL, or `memory` for a process-local store.
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_max_per_page")]
    pub max_per_page: i64,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_jwt_ttl_hours() -> u64 { MAX_TTL_HOURS }
fn default_hash_memory_kib() -> u32 { HashCost::default().memory_kib }
fn default_hash_iterations() -> u32 { HashCost::default().iterations }
fn default_hash_parallelism() -> u32 { HashCost::default().parallelism }
fn default_max_requests() -> u64 { 100 }
fn default_window_secs() -> u64 { 60 }
fn default_redis_url() -> String { "redis://127.0.0.1:6379".to_string() }
fn default_store_timeout_ms() -> u64 { 500 }
fn default_database_url() -> String { "sqlite://keygate.db".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout_secs() -> u64 { 3 }
fn default_allowed_origins() -> Vec<String> { vec!["*".to_string()] }
fn default_max_per_page() -> i64 { 100 }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_ttl_hours: default_jwt_ttl_hours(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            key_strategy: KeyStrategy::default(),
            fail_open: false,
            trust_forwarded_headers: false,
        }
    }
}

impl Default for CounterStoreConfig {
    fn default() -> Self {
        Self {
            backend: CounterBackend::default(),
            redis_url: default_redis_url(),
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { allowed_origins: default_allowed_origins() }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { max_per_page: default_max_per_page() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            counter_store: CounterStoreConfig::default(),
            database: DatabaseConfig::default(),
            cors: CorsConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{name}: {e}"))
}

fn parse_bool(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{name}: expected a boolean, got {other:?}"),
    }
}

impl ServerConfig {
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.auth.jwt_ttl_hours * 3600)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }

    pub fn counter_store_timeout(&self) -> Duration {
        Duration::from_millis(self.counter_store.timeout_ms)
    }

    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.auth.hash_memory_kib,
            iterations: self.auth.hash_iterations,
            parallelism: self.auth.hash_parallelism,
        }
    }

    pub fn uses_memory_database(&self) -> bool {
        self.database.url.eq_ignore_ascii_case("memory")
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("KEYGATE_CONFIG").map(PathBuf::from).ok();

        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?
            }
            None => ServerConfig::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `KEYGATE_*` overrides read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(addr) = var("KEYGATE_BIND_ADDR") {
            self.bind_addr = parse_env("KEYGATE_BIND_ADDR", &addr)?;
        }

        if let Some(secret) = var("KEYGATE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(val) = var("KEYGATE_JWT_TTL_HOURS") {
            self.auth.jwt_ttl_hours = parse_env("KEYGATE_JWT_TTL_HOURS", &val)?;
        }
        if let Some(val) = var("KEYGATE_HASH_MEMORY_KIB") {
            self.auth.hash_memory_kib = parse_env("KEYGATE_HASH_MEMORY_KIB", &val)?;
        }
        if let Some(val) = var("KEYGATE_HASH_ITERATIONS") {
            self.auth.hash_iterations = parse_env("KEYGATE_HASH_ITERATIONS", &val)?;
        }

        if let Some(val) = var("KEYGATE_RATE_LIMIT_MAX") {
            self.rate_limit.max_requests = parse_env("KEYGATE_RATE_LIMIT_MAX", &val)?;
        }
        if let Some(val) = var("KEYGATE_RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit.window_secs = parse_env("KEYGATE_RATE_LIMIT_WINDOW_SECS", &val)?;
        }
        if let Some(val) = var("KEYGATE_RATE_LIMIT_KEY") {
            self.rate_limit.key_strategy = parse_env("KEYGATE_RATE_LIMIT_KEY", &val)?;
        }
        if let Some(val) = var("KEYGATE_RATE_LIMIT_FAIL_OPEN") {
            self.rate_limit.fail_open = parse_bool("KEYGATE_RATE_LIMIT_FAIL_OPEN", &val)?;
        }
        if let Some(val) = var("KEYGATE_TRUST_FORWARDED_HEADERS") {
            self.rate_limit.trust_forwarded_headers =
                parse_bool("KEYGATE_TRUST_FORWARDED_HEADERS", &val)?;
        }

        if let Some(val) = var("KEYGATE_COUNTER_BACKEND") {
            self.counter_store.backend = match val.trim() {
                "redis" => CounterBackend::Redis,
                "memory" => CounterBackend::Memory,
                other => anyhow::bail!("KEYGATE_COUNTER_BACKEND: unknown backend {other:?}"),
            };
        }
        if let Some(url) = var("KEYGATE_REDIS_URL") {
            self.counter_store.redis_url = url;
        }

        if let Some(url) = var("KEYGATE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(val) = var("KEYGATE_CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(val) = var("KEYGATE_MAX_PER_PAGE") {
            self.pagination.max_per_page = parse_env("KEYGATE_MAX_PER_PAGE", &val)?;
        }

        Ok(())
    }

    /// Rejects settings the server must not start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let secret = self.auth.jwt_secret.trim();
        if secret.is_empty() {
            anyhow::bail!("No JWT secret configured. Set KEYGATE_JWT_SECRET.");
        }
        if WEAK_SECRETS.iter().any(|&w| secret.eq_ignore_ascii_case(w)) {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random secret via KEYGATE_JWT_SECRET."
            );
        }
        if secret.len() < 32 {
            tracing::warn!("JWT secret is shorter than 32 characters");
        }

        if !(MIN_TTL_HOURS..=MAX_TTL_HOURS).contains(&self.auth.jwt_ttl_hours) {
            anyhow::bail!(
                "jwt_ttl_hours must be between {MIN_TTL_HOURS} and {MAX_TTL_HOURS}, got {}",
                self.auth.jwt_ttl_hours
            );
        }

        if self.rate_limit.max_requests == 0 {
            anyhow::bail!("rate_limit.max_requests must be at least 1");
        }
        if self.rate_limit.window_secs == 0 {
            anyhow::bail!("rate_limit.window_secs must be at least 1");
        }
        if self.counter_store.timeout_ms == 0 {
            anyhow::bail!("counter_store.timeout_ms must be at least 1");
        }
        if self.pagination.max_per_page < 1 {
            anyhow::bail!("pagination.max_per_page must be at least 1");
        }

        if self.rate_limit.fail_open {
            tracing::warn!("rate limiter fails open: requests are admitted while the counter store is down");
        }

        Ok(())
    }
}
