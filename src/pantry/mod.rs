//! The user's food inventory. Saving and restocking food earns points.

mod dto;
mod handlers;
pub mod repo;
mod services;

pub use services::{award, PantryError};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
