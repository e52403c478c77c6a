mod auth_handlers;
mod users;

use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::error::AppError;
use crate::middleware::rate_limit::rate_limit;
use crate::state::AppState;

pub const API_PREFIX: &str = "/api/v1";

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/health", get(health))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/users", get(users::list_users))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true }))
}

async fn not_found() -> AppError {
    AppError::NotFound("URL not found".to_string())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

/// The whole HTTP surface. Every request, unknown paths included, passes the
/// rate limiter before any handler or token check runs.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .nest(API_PREFIX, public_router().merge(protected_router()))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
