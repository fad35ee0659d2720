use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::dto::{FoodActionResponse, NewFood, QuantityRequest};
use super::repo::{self, PantryItem};
use super::services::{self, PantryError};
use crate::{auth::AuthUser, db::Pagination, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/foods", get(list_foods).post(save_food))
        .route("/foods/:id/stock", post(add_stock))
        .route("/foods/:id/consume", post(consume))
}

#[instrument(skip(state))]
pub async fn list_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<PantryItem>>, (StatusCode, String)> {
    repo::list_by_user(&state.db, user_id, p.page())
        .await
        .map(Json)
        .map_err(|e| failure(PantryError::Storage(e)))
}

#[instrument(skip(state, body))]
pub async fn save_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<NewFood>,
) -> Result<(StatusCode, Json<FoodActionResponse>), (StatusCode, String)> {
    let created = services::save_food(&state, user_id, body).await.map_err(failure)?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state))]
pub async fn add_stock(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<FoodActionResponse>, (StatusCode, String)> {
    services::add_stock(&state, user_id, id, body.amount)
        .await
        .map(Json)
        .map_err(failure)
}

#[instrument(skip(state))]
pub async fn consume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<PantryItem>, (StatusCode, String)> {
    services::consume(&state, user_id, id, body.amount)
        .await
        .map(Json)
        .map_err(failure)
}

fn failure(e: PantryError) -> (StatusCode, String) {
    match &e {
        PantryError::Storage(err) => error!(error = %err, "pantry storage failure"),
        _ => info!(reason = %e, "pantry request rejected"),
    }
    (e.status(), e.to_string())
}
