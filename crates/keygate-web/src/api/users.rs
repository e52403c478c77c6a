use axum::extract::{OriginalUri, Query, State};
use axum::Json;
use keygate_core::PublicUser;

use crate::auth::middleware::AuthUser;
use crate::dto::{ListUsersQuery, PaginatedResponse};
use crate::error::AppError;
use crate::state::AppState;

pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<PublicUser>>, AppError> {
    let (page, per_page) = (query.page(), query.per_page());
    tracing::debug!(caller = %user.sub, page, per_page, "listing users");

    let page = state.users.list_users(page, per_page, uri.path()).await?;
    Ok(Json(PaginatedResponse {
        success: true,
        page,
    }))
}
