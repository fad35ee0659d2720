//! Points ledger, voucher catalogue and redemptions.

mod dto;
mod handlers;
pub mod ledger;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod repo;
pub mod store;
pub mod vouchers;

use crate::state::AppState;
use axum::Router;

pub use ledger::LedgerEntry;
pub use store::RewardsStore;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
