use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::ledger::{Balance, LedgerEntry, LedgerError};
use super::model::{PointTransaction, RedemptionDetails, Voucher};
use super::vouchers::VoucherError;
use crate::db::Page;

#[derive(Debug, Clone, Default)]
pub struct VoucherFilter {
    /// Case-insensitive substring of the store name.
    pub store: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Redeemed {
    pub redemption: RedemptionDetails,
    pub balance: Balance,
}

/// Points ledger and voucher catalogue. Every mutating call is one atomic
/// unit of work: it either applies completely or leaves no trace.
#[async_trait]
pub trait RewardsStore: Send + Sync {
    /// Zero balance for users that never earned.
    async fn balance(&self, user_id: Uuid) -> Result<Balance, LedgerError>;

    /// Creates the account on first use.
    async fn earn(&self, user_id: Uuid, entry: LedgerEntry) -> Result<Balance, LedgerError>;

    async fn spend(&self, user_id: Uuid, entry: LedgerEntry) -> Result<Balance, LedgerError>;

    /// Newest first, with the total number of transactions.
    async fn history(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<(Vec<PointTransaction>, i64), LedgerError>;

    /// Redeemable vouchers, cheapest first.
    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        page: Page,
        now: OffsetDateTime,
    ) -> Result<Vec<Voucher>, VoucherError>;

    async fn voucher(&self, voucher_id: Uuid) -> Result<Voucher, VoucherError>;

    async fn redeem(
        &self,
        user_id: Uuid,
        voucher_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Redeemed, VoucherError>;

    async fn mark_used(
        &self,
        user_id: Uuid,
        redemption_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<RedemptionDetails, VoucherError>;

    /// Newest first, stored status.
    async fn redemptions(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<RedemptionDetails>, VoucherError>;

    /// Stored-active and unexpired, soonest expiry first.
    async fn active_redemptions(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Vec<RedemptionDetails>, VoucherError>;
}
