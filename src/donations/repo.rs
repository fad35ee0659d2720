use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::model::{Donation, DonationDetails, DonationMarket, DonationStatus, DonationStats};
use super::services::{check_market, check_quantity, DonationError};
use crate::db::Page;
use crate::pantry::{repo as pantry_repo, repo::PantryItem, PantryError};

const MARKET_COLUMNS: &str = "id, name, description, address, phone, image_url, is_active";

#[derive(Debug)]
pub struct NewDonation<'a> {
    pub item_id: Uuid,
    pub market_id: Uuid,
    pub units: i32,
    pub points: i32,
    pub notes: Option<&'a str>,
}

pub async fn active_markets(db: &PgPool) -> Result<Vec<DonationMarket>, sqlx::Error> {
    let sql = format!(
        "SELECT {MARKET_COLUMNS} FROM donation_markets WHERE is_active = TRUE ORDER BY name ASC"
    );
    sqlx::query_as::<_, DonationMarket>(&sql).fetch_all(db).await
}

async fn market(
    conn: &mut PgConnection,
    market_id: Uuid,
) -> Result<Option<DonationMarket>, sqlx::Error> {
    let sql = format!("SELECT {MARKET_COLUMNS} FROM donation_markets WHERE id = $1 FOR SHARE");
    sqlx::query_as::<_, DonationMarket>(&sql)
        .bind(market_id)
        .fetch_optional(conn)
        .await
}

/// Checks run in order: item, quantity, market. The decrement and the
/// donation row commit together or not at all.
pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    new: &NewDonation<'_>,
) -> Result<(Donation, PantryItem, DonationMarket), DonationError> {
    let mut tx = db.begin().await?;

    let item = pantry_repo::lock_owned(&mut *tx, user_id, new.item_id)
        .await?
        .ok_or(PantryError::NotFound)?;
    check_quantity(&item, new.units)?;
    let market = check_market(market(&mut *tx, new.market_id).await?)?;

    let item = pantry_repo::take(&mut *tx, item.id, f64::from(new.units)).await?;
    let donation = sqlx::query_as::<_, Donation>(
        r#"
        INSERT INTO donations
            (id, user_id, food_id, market_id, quantity, points_earned, status, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, user_id, food_id, market_id, quantity, points_earned, status, notes,
                  created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(item.id)
    .bind(market.id)
    .bind(new.units)
    .bind(new.points)
    .bind(DonationStatus::Confirmed)
    .bind(new.notes)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((donation, item, market))
}

pub async fn by_user(
    db: &PgPool,
    user_id: Uuid,
    page: Page,
) -> Result<Vec<DonationDetails>, sqlx::Error> {
    sqlx::query_as::<_, DonationDetails>(
        r#"
        SELECT d.id, d.user_id, d.food_id, d.market_id, d.quantity, d.points_earned,
               d.status, d.notes, d.created_at,
               p.name AS food_name, p.unit, m.name AS market_name
        FROM donations d
        JOIN pantry_items p ON p.id = d.food_id
        JOIN donation_markets m ON m.id = d.market_id
        WHERE d.user_id = $1
        ORDER BY d.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(db)
    .await
}

pub async fn stats(db: &PgPool, user_id: Uuid) -> Result<DonationStats, sqlx::Error> {
    sqlx::query_as::<_, DonationStats>(
        r#"
        SELECT COUNT(*)::BIGINT AS total_donations,
               COALESCE(SUM(quantity), 0)::BIGINT AS total_units,
               COALESCE(SUM(points_earned), 0)::BIGINT AS total_points
        FROM donations
        WHERE user_id = $1 AND status <> 'cancelled'
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await
}
