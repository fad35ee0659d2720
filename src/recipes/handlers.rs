use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::model::RecipeCandidate;
use super::provider::ProviderError;
use super::ranking::Recommendations;
use super::services::recommend;
use crate::{auth::AuthUser, pantry, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/recommendations", get(recommendations))
        .route("/recipes/:id", get(recipe_detail))
}

#[instrument(skip(state))]
pub async fn recommendations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Recommendations>, (StatusCode, String)> {
    let names = pantry::repo::names_by_user(&state.db, user_id)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "load pantry names failed");
            (StatusCode::SERVICE_UNAVAILABLE, "pantry unavailable".to_string())
        })?;

    recommend(state.recipes.as_ref(), &names, &state.config.recipes)
        .await
        .map(Json)
        .map_err(upstream)
}

#[instrument(skip(state))]
pub async fn recipe_detail(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RecipeCandidate>, (StatusCode, String)> {
    state.recipes.fetch_detail(&id).await.map(Json).map_err(upstream)
}

fn upstream(e: ProviderError) -> (StatusCode, String) {
    match e {
        ProviderError::NotFound(_) | ProviderError::InvalidId(_) => (e.status(), e.to_string()),
        _ => {
            warn!(error = %e, "recipe provider failed");
            (e.status(), e.to_string())
        }
    }
}
