use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
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
use crate::{
    config::RewardsConfig,
    db::{with_retry, Page},
};

const VOUCHER_SELECT: &str = r#"
    SELECT id, code, title, description, discount_type, discount_value, min_purchase,
           max_discount, points_required, store_name, store_category, total_stock,
           remaining_stock, valid_from, valid_until, is_active, terms_conditions, image_url
    FROM vouchers
"#;

const REDEMPTION_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.voucher_id, r.points_spent, r.redemption_code, r.status,
           r.redeemed_at, r.used_at, r.expires_at,
           v.code AS voucher_code, v.title AS voucher_title, v.store_name,
           v.discount_type, v.discount_value
    FROM voucher_redemptions r
    JOIN vouchers v ON v.id = r.voucher_id
"#;

/// Postgres-backed ledger. Row locks are always taken voucher first, then
/// account, so concurrent redemptions cannot deadlock each other.
#[derive(Clone)]
pub struct PgRewards {
    db: PgPool,
    ttl_days: i64,
    max_attempts: u32,
}

impl PgRewards {
    pub fn new(db: PgPool, cfg: &RewardsConfig) -> Self {
        Self {
            db,
            ttl_days: cfg.redemption_ttl_days,
            max_attempts: cfg.tx_max_attempts,
        }
    }

    async fn earn_once(&self, user_id: Uuid, entry: &LedgerEntry) -> Result<Balance, LedgerError> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO user_points (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let account = lock_account(&mut tx, user_id)
            .await?
            .ok_or(LedgerError::AccountNotFound)?;
        let balance = account.balance().earn(entry.amount)?;
        write_balance(&mut tx, account.id, balance).await?;
        insert_transaction(&mut tx, account.id, TransactionKind::Earn, entry).await?;

        tx.commit().await?;
        Ok(balance)
    }

    async fn spend_once(&self, user_id: Uuid, entry: &LedgerEntry) -> Result<Balance, LedgerError> {
        let mut tx = self.db.begin().await?;
        let account = lock_account(&mut tx, user_id)
            .await?
            .ok_or(LedgerError::AccountNotFound)?;
        let balance = apply_spend(&mut tx, &account, entry).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn redeem_once(
        &self,
        user_id: Uuid,
        voucher_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Redeemed, VoucherError> {
        let mut tx = self.db.begin().await?;

        let sql = format!("{VOUCHER_SELECT} WHERE id = $1 FOR UPDATE");
        let mut voucher = sqlx::query_as::<_, Voucher>(&sql)
            .bind(voucher_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(VoucherError::NotFound)?;
        check_redeemable(&voucher, now)?;

        // No account yet means nothing to spend.
        let Some(account) = lock_account(&mut tx, user_id).await? else {
            return Err(VoucherError::InsufficientPoints {
                required: voucher.points_required,
                available: 0,
            });
        };
        check_affordable(&voucher, account.available_points)?;

        let entry = LedgerEntry::new(voucher.points_required, SOURCE_VOUCHER_REDEEM)
            .with_reference(voucher.id, "voucher")
            .with_description(format!("Redeemed voucher: {}", voucher.title));
        let balance = apply_spend(&mut tx, &account, &entry).await?;

        let stock = sqlx::query(
            r#"
            UPDATE vouchers
            SET remaining_stock = remaining_stock - 1, updated_at = now()
            WHERE id = $1 AND remaining_stock > 0
            "#,
        )
        .bind(voucher.id)
        .execute(&mut *tx)
        .await?;
        if stock.rows_affected() != 1 {
            return Err(VoucherError::OutOfStock);
        }
        voucher.remaining_stock -= 1;

        let redemption = sqlx::query_as::<_, VoucherRedemption>(
            r#"
            INSERT INTO voucher_redemptions
                (id, user_id, voucher_id, points_spent, redemption_code, status,
                 redeemed_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, voucher_id, points_spent, redemption_code, status,
                      redeemed_at, used_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(voucher.id)
        .bind(voucher.points_required)
        .bind(redemption_code())
        .bind(RedemptionStatus::Active)
        .bind(now)
        .bind(redemption_expiry(now, &voucher, self.ttl_days))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Redeemed {
            redemption: RedemptionDetails::new(redemption, &voucher),
            balance,
        })
    }

    async fn mark_used_once(
        &self,
        user_id: Uuid,
        redemption_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<RedemptionDetails, VoucherError> {
        let mut tx = self.db.begin().await?;

        let redemption = sqlx::query_as::<_, VoucherRedemption>(
            r#"
            SELECT id, user_id, voucher_id, points_spent, redemption_code, status,
                   redeemed_at, used_at, expires_at
            FROM voucher_redemptions
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(redemption_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(VoucherError::RedemptionNotFound)?;
        check_usable(&redemption, now)?;

        sqlx::query(
            r#"
            UPDATE voucher_redemptions
            SET status = $2, used_at = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(redemption.id)
        .bind(RedemptionStatus::Used)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let sql = format!("{REDEMPTION_SELECT} WHERE r.id = $1");
        let details = sqlx::query_as::<_, RedemptionDetails>(&sql)
            .bind(redemption.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(details)
    }
}

async fn lock_account(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<PointsAccount>, sqlx::Error> {
    sqlx::query_as::<_, PointsAccount>(
        r#"
        SELECT id, user_id, total_points, available_points, used_points, created_at, updated_at
        FROM user_points
        WHERE user_id = $1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
}

async fn write_balance(
    conn: &mut PgConnection,
    account_id: Uuid,
    balance: Balance,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE user_points
        SET total_points = $2, available_points = $3, used_points = $4, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(balance.total)
    .bind(balance.available)
    .bind(balance.used)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_transaction(
    conn: &mut PgConnection,
    account_id: Uuid,
    kind: TransactionKind,
    entry: &LedgerEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO point_transactions
            (id, account_id, kind, amount, source, description, reference_id, reference_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(account_id)
    .bind(kind)
    .bind(entry.amount)
    .bind(&entry.source)
    .bind(&entry.description)
    .bind(entry.reference_id)
    .bind(&entry.reference_type)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Debits a locked account and records the movement.
async fn apply_spend(
    conn: &mut PgConnection,
    account: &PointsAccount,
    entry: &LedgerEntry,
) -> Result<Balance, LedgerError> {
    let balance = account.balance().spend(entry.amount)?;
    write_balance(conn, account.id, balance).await?;
    insert_transaction(conn, account.id, TransactionKind::Spend, entry).await?;
    Ok(balance)
}

#[async_trait]
impl RewardsStore for PgRewards {
    #[instrument(skip(self))]
    async fn balance(&self, user_id: Uuid) -> Result<Balance, LedgerError> {
        let account = sqlx::query_as::<_, PointsAccount>(
            r#"
            SELECT id, user_id, total_points, available_points, used_points, created_at, updated_at
            FROM user_points
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(account.map(|a| a.balance()).unwrap_or_default())
    }

    #[instrument(skip(self, entry), fields(amount = entry.amount, source = %entry.source))]
    async fn earn(&self, user_id: Uuid, entry: LedgerEntry) -> Result<Balance, LedgerError> {
        entry.validate()?;
        let entry = &entry;
        let balance = with_retry(self.max_attempts, move || self.earn_once(user_id, entry)).await?;
        debug!(available = balance.available, "points earned");
        Ok(balance)
    }

    #[instrument(skip(self, entry), fields(amount = entry.amount, source = %entry.source))]
    async fn spend(&self, user_id: Uuid, entry: LedgerEntry) -> Result<Balance, LedgerError> {
        entry.validate()?;
        let entry = &entry;
        let balance = with_retry(self.max_attempts, move || self.spend_once(user_id, entry)).await?;
        debug!(available = balance.available, "points spent");
        Ok(balance)
    }

    #[instrument(skip(self))]
    async fn history(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<(Vec<PointTransaction>, i64), LedgerError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM point_transactions t
            JOIN user_points p ON p.id = t.account_id
            WHERE p.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, PointTransaction>(
            r#"
            SELECT t.id, t.account_id, t.kind, t.amount, t.source, t.description,
                   t.reference_id, t.reference_type, t.created_at
            FROM point_transactions t
            JOIN user_points p ON p.id = t.account_id
            WHERE p.user_id = $1
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok((rows, total))
    }

    #[instrument(skip(self))]
    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        page: Page,
        now: OffsetDateTime,
    ) -> Result<Vec<Voucher>, VoucherError> {
        let sql = format!(
            r#"{VOUCHER_SELECT}
            WHERE is_active
              AND remaining_stock > 0
              AND valid_until > $1
              AND ($2::text IS NULL OR store_name ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR LOWER(store_category) = LOWER($3))
            ORDER BY points_required ASC, id
            LIMIT $4 OFFSET $5
            "#
        );
        let rows = sqlx::query_as::<_, Voucher>(&sql)
            .bind(now)
            .bind(filter.store.as_deref())
            .bind(filter.category.as_deref())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn voucher(&self, voucher_id: Uuid) -> Result<Voucher, VoucherError> {
        let sql = format!("{VOUCHER_SELECT} WHERE id = $1");
        sqlx::query_as::<_, Voucher>(&sql)
            .bind(voucher_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(VoucherError::NotFound)
    }

    #[instrument(skip(self))]
    async fn redeem(
        &self,
        user_id: Uuid,
        voucher_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Redeemed, VoucherError> {
        let redeemed = with_retry(self.max_attempts, move || {
            self.redeem_once(user_id, voucher_id, now)
        })
        .await?;
        info!(
            redemption_id = %redeemed.redemption.redemption.id,
            available = redeemed.balance.available,
            "voucher redeemed"
        );
        Ok(redeemed)
    }

    #[instrument(skip(self))]
    async fn mark_used(
        &self,
        user_id: Uuid,
        redemption_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<RedemptionDetails, VoucherError> {
        with_retry(self.max_attempts, move || {
            self.mark_used_once(user_id, redemption_id, now)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn redemptions(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<RedemptionDetails>, VoucherError> {
        let sql = format!(
            "{REDEMPTION_SELECT} \
             WHERE r.user_id = $1 \
             ORDER BY r.redeemed_at DESC, r.id \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, RedemptionDetails>(&sql)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn active_redemptions(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Vec<RedemptionDetails>, VoucherError> {
        let sql = format!(
            "{REDEMPTION_SELECT} \
             WHERE r.user_id = $1 AND r.status = $2 AND r.expires_at >= $3 \
             ORDER BY r.expires_at ASC"
        );
        let rows = sqlx::query_as::<_, RedemptionDetails>(&sql)
            .bind(user_id)
            .bind(RedemptionStatus::Active)
            .bind(now)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::rewards::ledger::SOURCE_FOOD_SAVE;
    use crate::rewards::model::fixtures::voucher;

    const PAGE: Page = Page { limit: 20, offset: 0 };

    fn store(db: &PgPool) -> PgRewards {
        PgRewards::new(db.clone(), &RewardsConfig::default())
    }

    async fn insert_voucher(db: &PgPool, v: &Voucher) {
        sqlx::query(
            r#"
            INSERT INTO vouchers
                (id, code, title, description, discount_type, discount_value, min_purchase,
                 max_discount, points_required, store_name, store_category, total_stock,
                 remaining_stock, valid_from, valid_until, is_active, terms_conditions, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(v.id)
        .bind(&v.code)
        .bind(&v.title)
        .bind(&v.description)
        .bind(v.discount_type)
        .bind(v.discount_value)
        .bind(v.min_purchase)
        .bind(v.max_discount)
        .bind(v.points_required)
        .bind(&v.store_name)
        .bind(&v.store_category)
        .bind(v.total_stock)
        .bind(v.remaining_stock)
        .bind(v.valid_from)
        .bind(v.valid_until)
        .bind(v.is_active)
        .bind(&v.terms_conditions)
        .bind(&v.image_url)
        .execute(db)
        .await
        .unwrap();
    }

    async fn remaining_stock(db: &PgPool, voucher_id: Uuid) -> i32 {
        sqlx::query_scalar("SELECT remaining_stock FROM vouchers WHERE id = $1")
            .bind(voucher_id)
            .fetch_one(db)
            .await
            .unwrap()
    }

    async fn funded(store: &PgRewards, points: i32) -> Uuid {
        let user = Uuid::new_v4();
        store
            .earn(user, LedgerEntry::new(points, SOURCE_FOOD_SAVE))
            .await
            .unwrap();
        user
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs Postgres at DATABASE_URL"]
    async fn overdraft_leaves_balance_unchanged(db: PgPool) {
        let store = store(&db);
        let user = funded(&store, 100).await;

        let err = store
            .spend(user, LedgerEntry::new(150, SOURCE_VOUCHER_REDEEM))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientPoints { required: 150, available: 100 }
        ));
        let untouched = Balance { total: 100, available: 100, used: 0 };
        assert_eq!(store.balance(user).await.unwrap(), untouched);
        assert_eq!(store.history(user, PAGE).await.unwrap().1, 1);

        let after = store
            .spend(user, LedgerEntry::new(40, SOURCE_VOUCHER_REDEEM))
            .await
            .unwrap();
        assert_eq!(after, Balance { total: 100, available: 60, used: 40 });
        assert_eq!(store.balance(user).await.unwrap(), after);

        let (rows, total) = store.history(user, PAGE).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].kind, TransactionKind::Spend);
        assert_eq!(rows[0].amount, 40);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs Postgres at DATABASE_URL"]
    async fn spend_without_account_is_not_found(db: PgPool) {
        let store = store(&db);
        let err = store
            .spend(Uuid::new_v4(), LedgerEntry::new(1, SOURCE_VOUCHER_REDEEM))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs Postgres at DATABASE_URL"]
    async fn concurrent_redeems_of_last_unit_sell_once(db: PgPool) {
        let store = store(&db);
        let now = OffsetDateTime::now_utc();
        let v = voucher(100, 1, now);
        insert_voucher(&db, &v).await;

        let mut users = Vec::new();
        for _ in 0..8 {
            users.push(funded(&store, 100).await);
        }
        let handles: Vec<_> = users
            .iter()
            .map(|&user| {
                let store = store.clone();
                let voucher_id = v.id;
                tokio::spawn(async move { store.redeem(user, voucher_id, now).await })
            })
            .collect();

        let mut sold = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => sold += 1,
                Err(e) => assert!(matches!(e, VoucherError::OutOfStock), "{e}"),
            }
        }
        assert_eq!(sold, 1);
        assert_eq!(remaining_stock(&db, v.id).await, 0);

        let mut spent = 0;
        for user in users {
            spent += store.balance(user).await.unwrap().used;
        }
        assert_eq!(spent, 100);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs Postgres at DATABASE_URL"]
    async fn mark_used_twice_is_rejected(db: PgPool) {
        let store = store(&db);
        let now = OffsetDateTime::now_utc();
        let v = voucher(10, 5, now);
        insert_voucher(&db, &v).await;
        let user = funded(&store, 10).await;
        let id = store.redeem(user, v.id, now).await.unwrap().redemption.redemption.id;

        let err = store.mark_used(Uuid::new_v4(), id, now).await.unwrap_err();
        assert!(matches!(err, VoucherError::RedemptionNotFound));

        let used = store.mark_used(user, id, now).await.unwrap();
        assert_eq!(used.redemption.status, RedemptionStatus::Used);
        assert!(used.redemption.used_at.is_some());

        let err = store.mark_used(user, id, now).await.unwrap_err();
        assert!(matches!(err, VoucherError::InvalidState(RedemptionStatus::Used)));
        assert!(store.active_redemptions(user, now).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs Postgres at DATABASE_URL"]
    async fn redemption_is_active_through_its_expiry(db: PgPool) {
        let store = store(&db);
        let now = OffsetDateTime::now_utc();
        let v = voucher(10, 5, now);
        insert_voucher(&db, &v).await;
        let user = funded(&store, 10).await;
        let redeemed = store.redeem(user, v.id, now).await.unwrap().redemption.redemption;

        let active = store.active_redemptions(user, redeemed.expires_at).await.unwrap();
        assert_eq!(active.len(), 1);
        let later = redeemed.expires_at + Duration::seconds(1);
        assert!(store.active_redemptions(user, later).await.unwrap().is_empty());
        assert_eq!(store.redemptions(user, PAGE).await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs Postgres at DATABASE_URL"]
    async fn failed_redemption_insert_rolls_back_stock_and_points(db: PgPool) {
        let store = store(&db);
        let now = OffsetDateTime::now_utc();
        let v = voucher(100, 1, now);
        insert_voucher(&db, &v).await;
        let user = funded(&store, 100).await;

        sqlx::query(
            r#"
            CREATE FUNCTION reject_redemption() RETURNS trigger AS $$
            BEGIN
                RAISE EXCEPTION 'redemptions are closed';
            END;
            $$ LANGUAGE plpgsql
            "#,
        )
        .execute(&db)
        .await
        .unwrap();
        sqlx::query(
            r#"
            CREATE TRIGGER reject_redemption BEFORE INSERT ON voucher_redemptions
            FOR EACH ROW EXECUTE FUNCTION reject_redemption()
            "#,
        )
        .execute(&db)
        .await
        .unwrap();

        let err = store.redeem(user, v.id, now).await.unwrap_err();
        assert!(matches!(err, VoucherError::Storage(_)), "{err}");

        assert_eq!(remaining_stock(&db, v.id).await, 1);
        let untouched = Balance { total: 100, available: 100, used: 0 };
        assert_eq!(store.balance(user).await.unwrap(), untouched);
        assert_eq!(store.history(user, PAGE).await.unwrap().1, 1);
        assert!(store.redemptions(user, PAGE).await.unwrap().is_empty());
    }
}
