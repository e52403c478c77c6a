use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use keygate_core::{LoginInput, PublicUser, RegisterInput};

use crate::dto::{ApiResponse, LoginResponse};
use crate::error::AppError;
use crate::state::AppState;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        AppError::BadRequest("Invalid request body".to_string())
    })
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), AppError> {
    let input = body(payload)?;
    let user = state.users.register(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user))))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let input = body(payload)?;
    let issued = state.users.login(input).await?;
    Ok(Json(ApiResponse::ok(LoginResponse::from(issued))))
}
