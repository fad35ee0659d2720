use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::ledger::{Balance, LedgerEntry, LedgerError, SOURCE_VOUCHER_REDEEM};
use super::model::{
    PointTransaction, PointsAccount, RedemptionDetails, RedemptionStatus, TransactionKind,
    Voucher, VoucherRedemption,
};
use super::store::{Redeemed, RewardsStore, VoucherFilter};
use super::vouchers::{
    check_affordable, check_redeemable, check_usable, redemption_code, redemption_expiry,
    VoucherError,
};
use crate::db::Page;

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, PointsAccount>,
    transactions: Vec<PointTransaction>,
    vouchers: Vec<Voucher>,
    redemptions: Vec<VoucherRedemption>,
}

impl Inner {
    fn record(&mut self, account_id: Uuid, kind: TransactionKind, entry: &LedgerEntry) {
        self.transactions.push(PointTransaction {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount: entry.amount,
            source: entry.source.clone(),
            description: entry.description.clone(),
            reference_id: entry.reference_id,
            reference_type: entry.reference_type.clone(),
            created_at: OffsetDateTime::now_utc(),
        });
    }

    fn set_balance(&mut self, user_id: Uuid, balance: Balance) -> Option<Uuid> {
        let account = self.accounts.get_mut(&user_id)?;
        account.total_points = balance.total;
        account.available_points = balance.available;
        account.used_points = balance.used;
        account.updated_at = OffsetDateTime::now_utc();
        Some(account.id)
    }

    fn spend(&mut self, user_id: Uuid, entry: &LedgerEntry) -> Result<Balance, LedgerError> {
        let account = self.accounts.get(&user_id).ok_or(LedgerError::AccountNotFound)?;
        let balance = account.balance().spend(entry.amount)?;
        let account_id = self
            .set_balance(user_id, balance)
            .ok_or(LedgerError::AccountNotFound)?;
        self.record(account_id, TransactionKind::Spend, entry);
        Ok(balance)
    }

    fn details(&self, redemption: &VoucherRedemption) -> Option<RedemptionDetails> {
        self.vouchers
            .iter()
            .find(|v| v.id == redemption.voucher_id)
            .map(|v| RedemptionDetails::new(redemption.clone(), v))
    }
}

/// In-process rewards store for tests. A single mutex stands in for the
/// row locks of the Postgres store.
pub struct MemoryRewards {
    inner: Mutex<Inner>,
    ttl_days: i64,
}

impl MemoryRewards {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl_days: 30,
        }
    }

    pub async fn add_voucher(&self, voucher: Voucher) {
        self.inner.lock().await.vouchers.push(voucher);
    }

    pub async fn remaining_stock(&self, voucher_id: Uuid) -> Option<i32> {
        let inner = self.inner.lock().await;
        inner
            .vouchers
            .iter()
            .find(|v| v.id == voucher_id)
            .map(|v| v.remaining_stock)
    }
}

impl Default for MemoryRewards {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RewardsStore for MemoryRewards {
    async fn balance(&self, user_id: Uuid) -> Result<Balance, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .get(&user_id)
            .map(|a| a.balance())
            .unwrap_or_default())
    }

    async fn earn(&self, user_id: Uuid, entry: LedgerEntry) -> Result<Balance, LedgerError> {
        entry.validate()?;
        let mut inner = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        let current = inner
            .accounts
            .entry(user_id)
            .or_insert_with(|| PointsAccount {
                id: Uuid::new_v4(),
                user_id,
                total_points: 0,
                available_points: 0,
                used_points: 0,
                created_at: now,
                updated_at: now,
            })
            .balance();
        let balance = current.earn(entry.amount)?;
        let account_id = inner
            .set_balance(user_id, balance)
            .ok_or(LedgerError::AccountNotFound)?;
        inner.record(account_id, TransactionKind::Earn, &entry);
        Ok(balance)
    }

    async fn spend(&self, user_id: Uuid, entry: LedgerEntry) -> Result<Balance, LedgerError> {
        entry.validate()?;
        self.inner.lock().await.spend(user_id, &entry)
    }

    async fn history(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<(Vec<PointTransaction>, i64), LedgerError> {
        let inner = self.inner.lock().await;
        let Some(account) = inner.accounts.get(&user_id) else {
            return Ok((Vec::new(), 0));
        };
        let mine: Vec<&PointTransaction> = inner
            .transactions
            .iter()
            .rev()
            .filter(|t| t.account_id == account.id)
            .collect();
        let total = mine.len() as i64;
        let rows = mine
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok((rows, total))
    }

    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        page: Page,
        now: OffsetDateTime,
    ) -> Result<Vec<Voucher>, VoucherError> {
        let inner = self.inner.lock().await;
        let store = filter.store.as_deref().map(str::to_lowercase);
        let category = filter.category.as_deref().map(str::to_lowercase);
        let mut rows: Vec<Voucher> = inner
            .vouchers
            .iter()
            .filter(|v| v.is_active && v.remaining_stock > 0 && v.valid_until > now)
            .filter(|v| {
                store
                    .as_deref()
                    .map_or(true, |s| v.store_name.to_lowercase().contains(s))
            })
            .filter(|v| {
                category.as_deref().map_or(true, |c| {
                    v.store_category.as_deref().map(str::to_lowercase).as_deref() == Some(c)
                })
            })
            .cloned()
            .collect();
        rows.sort_by_key(|v| v.points_required);
        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn voucher(&self, voucher_id: Uuid) -> Result<Voucher, VoucherError> {
        let inner = self.inner.lock().await;
        inner
            .vouchers
            .iter()
            .find(|v| v.id == voucher_id)
            .cloned()
            .ok_or(VoucherError::NotFound)
    }

    async fn redeem(
        &self,
        user_id: Uuid,
        voucher_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Redeemed, VoucherError> {
        let mut inner = self.inner.lock().await;

        let idx = inner
            .vouchers
            .iter()
            .position(|v| v.id == voucher_id)
            .ok_or(VoucherError::NotFound)?;
        let voucher = inner.vouchers[idx].clone();
        check_redeemable(&voucher, now)?;

        let available = inner
            .accounts
            .get(&user_id)
            .map_or(0, |a| a.available_points);
        check_affordable(&voucher, available)?;

        let entry = LedgerEntry::new(voucher.points_required, SOURCE_VOUCHER_REDEEM)
            .with_reference(voucher.id, "voucher")
            .with_description(format!("Redeemed voucher: {}", voucher.title));
        let balance = inner.spend(user_id, &entry)?;

        inner.vouchers[idx].remaining_stock -= 1;

        let redemption = VoucherRedemption {
            id: Uuid::new_v4(),
            user_id,
            voucher_id,
            points_spent: voucher.points_required,
            redemption_code: redemption_code(),
            status: RedemptionStatus::Active,
            redeemed_at: now,
            used_at: None,
            expires_at: redemption_expiry(now, &voucher, self.ttl_days),
        };
        inner.redemptions.push(redemption.clone());

        Ok(Redeemed {
            redemption: RedemptionDetails::new(redemption, &inner.vouchers[idx]),
            balance,
        })
    }

    async fn mark_used(
        &self,
        user_id: Uuid,
        redemption_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<RedemptionDetails, VoucherError> {
        let mut inner = self.inner.lock().await;
        let redemption = inner
            .redemptions
            .iter_mut()
            .find(|r| r.id == redemption_id && r.user_id == user_id)
            .ok_or(VoucherError::RedemptionNotFound)?;
        check_usable(redemption, now)?;
        redemption.status = RedemptionStatus::Used;
        redemption.used_at = Some(now);
        let redemption = redemption.clone();
        inner.details(&redemption).ok_or(VoucherError::NotFound)
    }

    async fn redemptions(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<RedemptionDetails>, VoucherError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .redemptions
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .filter_map(|r| inner.details(r))
            .collect())
    }

    async fn active_redemptions(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Vec<RedemptionDetails>, VoucherError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<&VoucherRedemption> = inner
            .redemptions
            .iter()
            .filter(|r| {
                r.user_id == user_id && r.status == RedemptionStatus::Active && r.expires_at >= now
            })
            .collect();
        rows.sort_by_key(|r| r.expires_at);
        Ok(rows.into_iter().filter_map(|r| inner.details(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use time::Duration;

    use super::*;
    use crate::rewards::ledger::{SOURCE_DONATION, SOURCE_FOOD_SAVE};
    use crate::rewards::model::fixtures::voucher;

    const PAGE: Page = Page { limit: 20, offset: 0 };

    async fn funded(store: &MemoryRewards, points: i32) -> Uuid {
        let user = Uuid::new_v4();
        store
            .earn(user, LedgerEntry::new(points, SOURCE_FOOD_SAVE))
            .await
            .unwrap();
        user
    }

    #[tokio::test]
    async fn earn_spend_and_rejected_overdraft() {
        let store = MemoryRewards::new();
        let user = Uuid::new_v4();
        assert_eq!(store.balance(user).await.unwrap(), Balance::default());

        let b = store.earn(user, LedgerEntry::new(50, SOURCE_FOOD_SAVE)).await.unwrap();
        assert_eq!(b, Balance { total: 50, available: 50, used: 0 });

        let b = store
            .spend(user, LedgerEntry::new(30, SOURCE_VOUCHER_REDEEM))
            .await
            .unwrap();
        assert_eq!(b, Balance { total: 50, available: 20, used: 30 });

        match store.spend(user, LedgerEntry::new(30, SOURCE_VOUCHER_REDEEM)).await {
            Err(LedgerError::InsufficientPoints { required, available }) => {
                assert_eq!((required, available), (30, 20));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.balance(user).await.unwrap(), b);

        let (rows, total) = store.history(user, PAGE).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].kind, TransactionKind::Spend);
        assert_eq!(rows[1].kind, TransactionKind::Earn);
    }

    #[tokio::test]
    async fn spend_without_account_fails() {
        let store = MemoryRewards::new();
        let err = store
            .spend(Uuid::new_v4(), LedgerEntry::new(1, SOURCE_VOUCHER_REDEEM))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound));
    }

    #[tokio::test]
    async fn invalid_entries_leave_no_account_behind() {
        let store = MemoryRewards::new();
        let user = Uuid::new_v4();
        assert!(store.earn(user, LedgerEntry::new(0, SOURCE_DONATION)).await.is_err());
        assert!(store.earn(user, LedgerEntry::new(5, "Bad Tag")).await.is_err());
        let (rows, total) = store.history(user, PAGE).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let store = MemoryRewards::new();
        let user = Uuid::new_v4();
        for amount in 1..=5 {
            store.earn(user, LedgerEntry::new(amount, SOURCE_DONATION)).await.unwrap();
        }
        let (rows, total) = store.history(user, Page { limit: 2, offset: 1 }).await.unwrap();
        assert_eq!(total, 5);
        let amounts: Vec<i32> = rows.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![4, 3]);
    }

    #[tokio::test]
    async fn redeem_last_unit_then_out_of_stock() {
        let store = MemoryRewards::new();
        let now = OffsetDateTime::now_utc();
        let v = voucher(100, 1, now);
        let vid = v.id;
        store.add_voucher(v).await;

        let user = funded(&store, 150).await;
        let redeemed = store.redeem(user, vid, now).await.unwrap();
        assert_eq!(redeemed.balance.available, 50);
        assert_eq!(redeemed.redemption.redemption.status, RedemptionStatus::Active);
        assert_eq!(redeemed.redemption.redemption.points_spent, 100);
        assert_eq!(store.remaining_stock(vid).await, Some(0));

        let other = funded(&store, 500).await;
        let err = store.redeem(other, vid, now).await.unwrap_err();
        assert!(matches!(err, VoucherError::OutOfStock));
        assert_eq!(store.balance(other).await.unwrap().available, 500);
    }

    #[tokio::test]
    async fn redeem_without_points_changes_nothing() {
        let store = MemoryRewards::new();
        let now = OffsetDateTime::now_utc();
        let v = voucher(100, 3, now);
        let vid = v.id;
        store.add_voucher(v).await;

        let stranger = Uuid::new_v4();
        let err = store.redeem(stranger, vid, now).await.unwrap_err();
        assert!(matches!(err, VoucherError::InsufficientPoints { required: 100, available: 0 }));

        let poor = funded(&store, 40).await;
        let err = store.redeem(poor, vid, now).await.unwrap_err();
        assert!(matches!(err, VoucherError::InsufficientPoints { required: 100, available: 40 }));
        assert_eq!(store.remaining_stock(vid).await, Some(3));
        assert!(store.redemptions(poor, PAGE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_voucher_is_not_found() {
        let store = MemoryRewards::new();
        let user = funded(&store, 100).await;
        let err = store
            .redeem(user, Uuid::new_v4(), OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::NotFound));
    }

    #[tokio::test]
    async fn concurrent_redeems_of_last_unit_yield_one_success() {
        let store = Arc::new(MemoryRewards::new());
        let now = OffsetDateTime::now_utc();
        let v = voucher(100, 1, now);
        let vid = v.id;
        store.add_voucher(v).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let user = funded(&store, 100).await;
            handles.push(tokio::spawn(async move { store.redeem(user, vid, now).await }));
        }

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(VoucherError::OutOfStock) => {}
                Err(e) => panic!("unexpected {e:?}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.remaining_stock(vid).await, Some(0));
    }

    #[tokio::test]
    async fn every_redemption_gets_a_distinct_code() {
        let store = MemoryRewards::new();
        let now = OffsetDateTime::now_utc();
        let v = voucher(10, 50, now);
        let vid = v.id;
        store.add_voucher(v).await;

        let user = funded(&store, 500).await;
        let mut codes = HashSet::new();
        for _ in 0..50 {
            let r = store.redeem(user, vid, now).await.unwrap();
            codes.insert(r.redemption.redemption.redemption_code);
        }
        assert_eq!(codes.len(), 50);
        assert_eq!(
            store.balance(user).await.unwrap(),
            Balance {
                total: 500,
                available: 0,
                used: 500
            }
        );
    }

    #[tokio::test]
    async fn mark_used_once_then_invalid_state() {
        let store = MemoryRewards::new();
        let now = OffsetDateTime::now_utc();
        let v = voucher(10, 5, now);
        let vid = v.id;
        store.add_voucher(v).await;
        let user = funded(&store, 10).await;
        let rid = store.redeem(user, vid, now).await.unwrap().redemption.redemption.id;

        // someone else's redemption is invisible
        let err = store.mark_used(Uuid::new_v4(), rid, now).await.unwrap_err();
        assert!(matches!(err, VoucherError::RedemptionNotFound));

        let used = store.mark_used(user, rid, now).await.unwrap();
        assert_eq!(used.redemption.status, RedemptionStatus::Used);
        assert_eq!(used.redemption.used_at, Some(now));

        let err = store.mark_used(user, rid, now).await.unwrap_err();
        assert!(matches!(err, VoucherError::InvalidState(RedemptionStatus::Used)));
    }

    #[tokio::test]
    async fn expired_redemption_cannot_be_used() {
        let store = MemoryRewards::new();
        let now = OffsetDateTime::now_utc();
        let v = voucher(10, 5, now);
        let vid = v.id;
        store.add_voucher(v).await;
        let user = funded(&store, 10).await;
        let rid = store.redeem(user, vid, now).await.unwrap().redemption.redemption.id;

        let later = now + Duration::days(31);
        let err = store.mark_used(user, rid, later).await.unwrap_err();
        assert!(matches!(err, VoucherError::InvalidState(RedemptionStatus::Expired)));
        assert!(store.active_redemptions(user, later).await.unwrap().is_empty());
        assert_eq!(store.active_redemptions(user, now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redemption_is_active_up_to_its_expiry_instant() {
        let store = MemoryRewards::new();
        let now = OffsetDateTime::now_utc();
        let v = voucher(10, 5, now);
        let vid = v.id;
        store.add_voucher(v).await;
        let user = funded(&store, 10).await;
        let redeemed = store.redeem(user, vid, now).await.unwrap().redemption.redemption;

        let at_expiry = store.active_redemptions(user, redeemed.expires_at).await.unwrap();
        assert_eq!(at_expiry.len(), 1);
        assert_eq!(at_expiry[0].redemption.id, redeemed.id);

        let after = redeemed.expires_at + Duration::seconds(1);
        assert!(store.active_redemptions(user, after).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalogue_hides_unredeemable_and_sorts_by_cost() {
        let store = MemoryRewards::new();
        let now = OffsetDateTime::now_utc();

        let pricey = voucher(300, 5, now);
        let cheap = voucher(50, 5, now);
        let empty = voucher(10, 0, now);
        let mut inactive = voucher(10, 5, now);
        inactive.is_active = false;
        let mut lapsed = voucher(10, 5, now);
        lapsed.valid_until = now - Duration::days(1);
        let mut other_store = voucher(20, 5, now);
        other_store.store_name = "Alfamart".into();
        other_store.store_category = Some("minimarket".into());

        let (pricey_id, cheap_id, other_id) = (pricey.id, cheap.id, other_store.id);
        for v in [pricey, cheap, empty, inactive, lapsed, other_store] {
            store.add_voucher(v).await;
        }

        let all = store.list_vouchers(&VoucherFilter::default(), PAGE, now).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![other_id, cheap_id, pricey_id]);

        let filter = VoucherFilter { store: Some("superIN".into()), category: None };
        let ids: Vec<Uuid> = store
            .list_vouchers(&filter, PAGE, now)
            .await
            .unwrap()
            .iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec![cheap_id, pricey_id]);

        let filter = VoucherFilter { store: None, category: Some("MINIMARKET".into()) };
        assert_eq!(store.list_vouchers(&filter, PAGE, now).await.unwrap().len(), 1);
    }
}
