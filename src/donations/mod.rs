//! Giving pantry food to donation markets. A donation is recorded against the
//! market, reduces the item and earns points per unit.

mod dto;
mod handlers;
pub mod model;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
