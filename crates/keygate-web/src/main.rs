mod api;
mod auth;
mod config;
mod dto;
mod error;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use keygate_core::{
    CounterStore, CredentialStore, MemoryCounterStore, MemoryCredentialStore, PasswordHasher,
    RateLimiter, RedisCounterStore, SqliteCredentialStore, TokenService, UserService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{CounterBackend, ServerConfig};
use crate::state::AppState;

const COUNTER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

async fn credential_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    if config.uses_memory_database() {
        tracing::warn!("Using the in-memory credential store; users are lost on restart");
        return Ok(Arc::new(MemoryCredentialStore::new()));
    }

    let store = SqliteCredentialStore::connect(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.acquire_timeout_secs),
    )
    .await
    .with_context(|| format!("opening credential store at {}", config.database.url))?;

    tracing::info!("Credential store: {}", config.database.url);
    Ok(Arc::new(store))
}

async fn counter_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn CounterStore>> {
    match config.counter_store.backend {
        CounterBackend::Redis => {
            let store =
                RedisCounterStore::connect(&config.counter_store.redis_url, config.counter_store_timeout())
                    .await
                    .context("connecting to the redis counter store")?;
            Ok(Arc::new(store))
        }
        CounterBackend::Memory => {
            tracing::warn!("Using the in-memory counter store; limits are per process");
            let store = Arc::new(MemoryCounterStore::new());

            let cleanup = store.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(COUNTER_CLEANUP_INTERVAL);
                loop {
                    interval.tick().await;
                    cleanup.cleanup_expired();
                }
            });

            Ok(store as Arc<dyn CounterStore>)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keygate_web=debug,keygate_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;

    let tokens = Arc::new(TokenService::new(
        config.auth.jwt_secret.clone(),
        config.token_lifetime(),
    )?);
    let hasher = PasswordHasher::new(config.hash_cost())?;
    let users = UserService::new(credential_store(&config).await?, hasher, tokens.clone())?
        .with_max_per_page(config.pagination.max_per_page);
    let limiter = RateLimiter::new(
        counter_store(&config).await?,
        config.rate_limit.max_requests,
        config.rate_limit_window(),
    )?;

    tracing::info!(
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        key_strategy = ?config.rate_limit.key_strategy,
        "Rate limiter ready"
    );

    let state = AppState {
        config: Arc::new(config),
        tokens,
        users: Arc::new(users),
        limiter: Arc::new(limiter),
    };

    let app = api::app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("keygate listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
