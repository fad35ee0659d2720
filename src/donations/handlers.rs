use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::dto::{DonateRequest, DonationResponse};
use super::model::{DonationDetails, DonationMarket, DonationStats};
use super::services::{self, DonationError};
use crate::{auth::AuthUser, db::Pagination, pantry::PantryError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/foods/:id/donate", post(donate))
        .route("/donations", get(list_donations))
        .route("/donations/markets", get(list_markets))
        .route("/donations/stats", get(stats))
}

#[instrument(skip(state, body))]
pub async fn donate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DonateRequest>,
) -> Result<(StatusCode, Json<DonationResponse>), (StatusCode, String)> {
    let created = services::donate(&state, user_id, id, body)
        .await
        .map_err(failure)?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state))]
pub async fn list_markets(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<DonationMarket>>, (StatusCode, String)> {
    services::markets(&state).await.map(Json).map_err(failure)
}

#[instrument(skip(state))]
pub async fn list_donations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<DonationDetails>>, (StatusCode, String)> {
    services::history(&state, user_id, p.page())
        .await
        .map(Json)
        .map_err(failure)
}

#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DonationStats>, (StatusCode, String)> {
    services::stats(&state, user_id)
        .await
        .map(Json)
        .map_err(failure)
}

fn failure(e: DonationError) -> (StatusCode, String) {
    match &e {
        DonationError::Pantry(PantryError::Storage(err)) => {
            error!(error = %err, "donation storage failure")
        }
        _ => info!(reason = %e, "donation request rejected"),
    }
    (e.status(), e.to_string())
}
