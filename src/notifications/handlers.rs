use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use super::repo;
use super::services::{derive, Notification};
use crate::{auth::AuthUser, pantry, state::AppState};

const MAX_NOTIFICATION_ID_LEN: usize = 200;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(all_notifications))
        .route("/notifications/expiring", get(expiring_notifications))
        .route("/notifications/:id/read", post(mark_read))
}

#[instrument(skip(state))]
pub async fn all_notifications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Notification>>, (StatusCode, String)> {
    notifications(&state, user_id, true).await.map(Json)
}

#[instrument(skip(state))]
pub async fn expiring_notifications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Notification>>, (StatusCode, String)> {
    notifications(&state, user_id, false).await.map(Json)
}

#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let id = id.trim();
    if id.is_empty() || id.len() > MAX_NOTIFICATION_ID_LEN {
        return Err((StatusCode::BAD_REQUEST, "invalid notification id".into()));
    }
    repo::mark_read(&state.db, user_id, id).await.map_err(unavailable)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn notifications(
    state: &AppState,
    user_id: Uuid,
    include_low_stock: bool,
) -> Result<Vec<Notification>, (StatusCode, String)> {
    let items = pantry::repo::stocked_by_user(&state.db, user_id)
        .await
        .map_err(unavailable)?;

    // A missing read set only means already-read notifications reappear.
    let read = repo::read_ids(&state.db, user_id).await.unwrap_or_else(|e| {
        warn!(error = %e, %user_id, "load read notifications failed");
        HashSet::new()
    });

    Ok(derive(&items, &read, OffsetDateTime::now_utc(), include_low_stock))
}

fn unavailable(e: sqlx::Error) -> (StatusCode, String) {
    error!(error = %e, "notification storage failure");
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}
