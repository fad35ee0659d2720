use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo::PantryItem;

#[derive(Debug, Deserialize)]
pub struct NewFood {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub location: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expiry_date: Option<OffsetDateTime>,
}
fn default_category() -> String {
    "Other".into()
}
fn default_unit() -> String {
    "pcs".into()
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub amount: f64,
}

/// Pantry write result; `points_awarded` is 0 when no award was made.
#[derive(Debug, Serialize)]
pub struct FoodActionResponse {
    pub item: PantryItem,
    pub points_awarded: i32,
}
