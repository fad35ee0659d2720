//! Expiry and low-stock notifications, derived from the pantry on demand.

mod handlers;
mod repo;
mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
