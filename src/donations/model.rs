use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "donation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

/// A place that accepts donated food.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DonationMarket {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub phone: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Donation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_id: Uuid,
    pub market_id: Uuid,
    pub quantity: i32,
    pub points_earned: i32,
    pub status: DonationStatus,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Donation joined with the food and market it refers to.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DonationDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub donation: Donation,
    pub food_name: String,
    pub unit: String,
    pub market_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct DonationStats {
    pub total_donations: i64,
    pub total_units: i64,
    pub total_points: i64,
}
