use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    customers::{repo_types::Customer, services},
    error::ApiResult,
    pagination::Page,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers))
        .route("/customers/:id", get(get_customer))
}

#[instrument(skip(state))]
pub async fn list_customers(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<Customer>>> {
    Ok(Json(services::list(&state, &username, &params).await?))
}

#[instrument(skip(state))]
pub async fn get_customer(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(services::get(&state, &username, id).await?))
}
