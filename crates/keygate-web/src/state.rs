use std::sync::Arc;

use keygate_core::{RateLimiter, TokenService, UserService};

use crate::config::ServerConfig;

/// Shared per-process services. Everything is constructed once in `main`
/// and injected here; nothing reads globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub tokens: Arc<TokenService>,
    pub users: Arc<UserService>,
    pub limiter: Arc<RateLimiter>,
}
