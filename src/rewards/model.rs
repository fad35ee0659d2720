use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::ledger::Balance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "point_transaction_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earn,
    Spend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// Stored status only ever moves `Active -> Used`; `Expired` is what an
/// active redemption reads as once its expiry has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "redemption_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Active,
    Used,
    Expired,
}

#[derive(Debug, Clone, FromRow)]
pub struct PointsAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_points: i32,
    pub available_points: i32,
    pub used_points: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl PointsAccount {
    pub fn balance(&self) -> Balance {
        Balance {
            total: self.total_points,
            available: self.available_points,
            used: self.used_points,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PointTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    pub amount: i32,
    pub source: String,
    pub description: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Voucher {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub min_purchase: f64,
    pub max_discount: Option<f64>,
    pub points_required: i32,
    pub store_name: String,
    pub store_category: Option<String>,
    pub total_stock: i32,
    pub remaining_stock: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_until: OffsetDateTime,
    pub is_active: bool,
    pub terms_conditions: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VoucherRedemption {
    pub id: Uuid,
    pub user_id: Uuid,
    pub voucher_id: Uuid,
    pub points_spent: i32,
    pub redemption_code: String,
    pub status: RedemptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub redeemed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub used_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl VoucherRedemption {
    pub fn effective_status(&self, now: OffsetDateTime) -> RedemptionStatus {
        match self.status {
            RedemptionStatus::Active if now > self.expires_at => RedemptionStatus::Expired,
            status => status,
        }
    }
}

/// Redemption joined with the voucher fields shown alongside it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RedemptionDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub redemption: VoucherRedemption,
    pub voucher_code: String,
    pub voucher_title: String,
    pub store_name: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
}

impl RedemptionDetails {
    pub fn new(redemption: VoucherRedemption, voucher: &Voucher) -> Self {
        Self {
            redemption,
            voucher_code: voucher.code.clone(),
            voucher_title: voucher.title.clone(),
            store_name: voucher.store_name.clone(),
            discount_type: voucher.discount_type,
            discount_value: voucher.discount_value,
        }
    }

    /// Rewrites the stored status to what the holder should see at `now`.
    pub fn at(mut self, now: OffsetDateTime) -> Self {
        self.redemption.status = self.redemption.effective_status(now);
        self
    }
}
