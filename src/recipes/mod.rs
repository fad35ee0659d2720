//! Recipe candidates from the external provider, ranked against the pantry.

mod handlers;
pub mod model;
pub mod provider;
pub mod ranking;
mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
