use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use keygate_core::{Admission, Denial, KeyStrategy, TokenService};

use crate::error::AppError;
use crate::state::AppState;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

const UNKNOWN_CLIENT: &str = "unknown";

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let from_xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let from_real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    from_xff.or_else(from_real_ip).map(String::from)
}

/// Address the request came from.
pub fn client_ip(req: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Counter key for `req`. Identity keys only apply to requests carrying a
/// valid token; everything else is keyed by address.
pub fn client_key(state: &AppState, req: &Request<Body>) -> String {
    let ip = client_ip(req, state.config.rate_limit.trust_forwarded_headers);

    if state.config.rate_limit.key_strategy == KeyStrategy::Identity {
        let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if let Ok(token) = TokenService::bearer(header) {
            if let Ok(claims) = state.tokens.validate(token) {
                return format!("user:{}", claims.sub);
            }
        }
    }

    format!("ip:{ip}")
}

/// Admission gate in front of every route, including token validation.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&state, &req);

    match state.limiter.admit(&key).await {
        Admission::Allowed { remaining, .. } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert(LIMIT_HEADER, HeaderValue::from(state.limiter.max_requests()));
            headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Admission::Denied(Denial::Exhausted { retry_after }) => {
            tracing::warn!(client = %key, path = %req.uri().path(), "rate limit exceeded");
            AppError::RateLimited { retry_after }.into_response()
        }
        Admission::Denied(Denial::Unavailable(_)) if state.config.rate_limit.fail_open => {
            tracing::warn!(client = %key, "counter store down, admitting request");
            next.run(req).await
        }
        Admission::Denied(Denial::Unavailable(_)) => AppError::LimiterUnavailable.into_response(),
    }
}
