use axum::http::StatusCode;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{FoodActionResponse, NewFood};
use super::repo::{self, PantryItem};
use crate::{
    rewards::{ledger::SOURCE_FOOD_SAVE, LedgerEntry, RewardsStore},
    state::AppState,
};

#[derive(Debug, Error)]
pub enum PantryError {
    #[error("name must not be empty")]
    InvalidName,
    #[error("quantity must be a positive number")]
    InvalidQuantity,
    #[error("food item not found")]
    NotFound,
    #[error("storage: {0}")]
    Storage(#[from] sqlx::Error),
}

impl PantryError {
    pub fn status(&self) -> StatusCode {
        match self {
            PantryError::InvalidName | PantryError::InvalidQuantity => StatusCode::BAD_REQUEST,
            PantryError::NotFound => StatusCode::NOT_FOUND,
            PantryError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn positive(amount: f64) -> Result<f64, PantryError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(PantryError::InvalidQuantity)
    }
}

pub fn validate_new_food(food: &NewFood) -> Result<(), PantryError> {
    if food.name.trim().is_empty() {
        return Err(PantryError::InvalidName);
    }
    positive(food.quantity)?;
    Ok(())
}

/// Points for pantry actions are a bonus: a failed award is logged and the
/// pantry write still stands.
pub async fn award(rewards: &dyn RewardsStore, user_id: Uuid, entry: LedgerEntry) -> i32 {
    let amount = entry.amount;
    let source = entry.source.clone();
    match rewards.earn(user_id, entry).await {
        Ok(balance) => {
            info!(%user_id, amount, %source, available = balance.available, "points awarded");
            amount
        }
        Err(e) => {
            warn!(%user_id, amount, %source, error = %e, "points award failed");
            0
        }
    }
}

fn food_save_entry(state: &AppState, item: &PantryItem) -> LedgerEntry {
    LedgerEntry::new(state.config.rewards.points_per_food_save, SOURCE_FOOD_SAVE)
        .with_reference(item.id, "food")
        .with_description(format!("Saved food: {}", item.name))
}

#[instrument(skip(state, food), fields(name = %food.name))]
pub async fn save_food(
    state: &AppState,
    user_id: Uuid,
    food: NewFood,
) -> Result<FoodActionResponse, PantryError> {
    validate_new_food(&food)?;
    let item = repo::insert(&state.db, user_id, &food).await?;
    let entry = food_save_entry(state, &item);
    let points_awarded = award(state.rewards.as_ref(), user_id, entry).await;
    Ok(FoodActionResponse { item, points_awarded })
}

#[instrument(skip(state))]
pub async fn add_stock(
    state: &AppState,
    user_id: Uuid,
    item_id: Uuid,
    amount: f64,
) -> Result<FoodActionResponse, PantryError> {
    let amount = positive(amount)?;
    let item = repo::add_stock(&state.db, user_id, item_id, amount)
        .await?
        .ok_or(PantryError::NotFound)?;
    let entry = food_save_entry(state, &item);
    let points_awarded = award(state.rewards.as_ref(), user_id, entry).await;
    Ok(FoodActionResponse { item, points_awarded })
}

/// Remaining quantity never goes below zero.
#[instrument(skip(state))]
pub async fn consume(
    state: &AppState,
    user_id: Uuid,
    item_id: Uuid,
    amount: f64,
) -> Result<PantryItem, PantryError> {
    let amount = positive(amount)?;
    repo::consume(&state.db, user_id, item_id, amount)
        .await?
        .ok_or(PantryError::NotFound)
}
