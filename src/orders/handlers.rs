use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::ApiResult,
    orders::{
        dto::{OrderView, PlaceOrderRequest, StatusRequest},
        repo_types::Order,
        services,
    },
    pagination::Pagination,
    state::AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(place_order))
        .route("/orders/:order_number", get(get_order).delete(delete_order))
        .route("/orders/:order_number/status", patch(update_status))
}

#[instrument(skip(state, payload))]
pub async fn place_order(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    let Json(payload) = payload?;
    let view = services::place(&state, &username, payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    p: Result<Query<Pagination>, QueryRejection>,
) -> ApiResult<Json<Vec<Order>>> {
    let Query(p) = p?;
    Ok(Json(services::list(&state, &username, &p).await?))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(order_number): Path<String>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(services::get(&state, &username, &order_number).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(order_number): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<OrderView>> {
    let Json(payload) = payload?;
    let view = services::update_status(&state, &username, &order_number, payload.status).await?;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn delete_order(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(order_number): Path<String>,
) -> ApiResult<StatusCode> {
    services::delete(&state, &username, &order_number).await?;
    Ok(StatusCode::NO_CONTENT)
}
