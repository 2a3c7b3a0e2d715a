use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        extractors::AuthUser,
        services::{self, CONFIRM_FAILED},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::dto::UserSummary,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/login", post(login))
        .route("/users/register", post(register))
        .route("/users/confirm", post(confirm))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<String>> {
    let Json(payload) = payload?;
    let token = services::authenticate(&state, payload).await?;
    Ok(Json(token))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserSummary>)> {
    let Json(payload) = payload?;
    let summary = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[instrument(skip(state))]
pub async fn confirm(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> ApiResult<StatusCode> {
    if services::confirm(&state, &username).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::IllegalState(CONFIRM_FAILED.into()))
    }
}
