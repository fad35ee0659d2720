use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::Donation;
use crate::pantry::repo::PantryItem;

#[derive(Debug, Deserialize)]
pub struct DonateRequest {
    pub market_id: Uuid,
    pub units: i32,
    pub notes: Option<String>,
}

/// `points_awarded` is 0 when the ledger was unavailable; `points_earned` on
/// the donation is what it was worth.
#[derive(Debug, Serialize)]
pub struct DonationResponse {
    pub donation: Donation,
    pub item: PantryItem,
    pub points_awarded: i32,
}
