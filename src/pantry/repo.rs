use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::NewFood;
use crate::db::Page;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PantryItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: String,
    pub quantity_remaining: f64,
    pub quantity_initial: f64,
    pub unit: String,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expiry_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const ITEM_COLUMNS: &str = "id, user_id, name, category, quantity_remaining, quantity_initial, \
                            unit, location, expiry_date, created_at";

/// Pantry names the matcher sees: items still in stock, newest first.
pub async fn names_by_user(db: &PgPool, user_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT name
        FROM pantry_items
        WHERE user_id = $1 AND quantity_remaining > 0
        ORDER BY created_at DESC
        LIMIT 100
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    food: &NewFood,
) -> Result<PantryItem, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO pantry_items
            (id, user_id, name, category, quantity_remaining, quantity_initial,
             unit, location, expiry_date)
        VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8)
        RETURNING {ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, PantryItem>(&sql)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(food.name.trim())
        .bind(food.category.trim())
        .bind(food.quantity)
        .bind(food.unit.trim())
        .bind(food.location.as_deref())
        .bind(food.expiry_date)
        .fetch_one(db)
        .await
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    page: Page,
) -> Result<Vec<PantryItem>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {ITEM_COLUMNS}
        FROM pantry_items
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#
    );
    sqlx::query_as::<_, PantryItem>(&sql)
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(db)
        .await
}

/// Everything with stock left, for notification derivation.
pub async fn stocked_by_user(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Vec<PantryItem>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {ITEM_COLUMNS}
        FROM pantry_items
        WHERE user_id = $1 AND quantity_remaining > 0
        ORDER BY created_at DESC
        "#
    );
    sqlx::query_as::<_, PantryItem>(&sql)
        .bind(user_id)
        .fetch_all(db)
        .await
}

/// Restocking raises the baseline too, so low-stock is measured against it.
pub async fn add_stock(
    db: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    amount: f64,
) -> Result<Option<PantryItem>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE pantry_items
        SET quantity_remaining = quantity_remaining + $3,
            quantity_initial = quantity_initial + $3,
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING {ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, PantryItem>(&sql)
        .bind(item_id)
        .bind(user_id)
        .bind(amount)
        .fetch_optional(db)
        .await
}

pub async fn consume(
    db: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    amount: f64,
) -> Result<Option<PantryItem>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE pantry_items
        SET quantity_remaining = GREATEST(quantity_remaining - $3, 0),
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING {ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, PantryItem>(&sql)
        .bind(item_id)
        .bind(user_id)
        .bind(amount)
        .fetch_optional(db)
        .await
}

/// Row-locks an owned item for the rest of the caller's transaction.
pub async fn lock_owned(
    conn: &mut PgConnection,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<Option<PantryItem>, sqlx::Error> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM pantry_items WHERE id = $1 AND user_id = $2 FOR UPDATE"
    );
    sqlx::query_as::<_, PantryItem>(&sql)
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

/// Caller must hold the row lock and have checked `amount` against what is left.
pub async fn take(
    conn: &mut PgConnection,
    item_id: Uuid,
    amount: f64,
) -> Result<PantryItem, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE pantry_items
        SET quantity_remaining = quantity_remaining - $2, updated_at = now()
        WHERE id = $1
        RETURNING {ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, PantryItem>(&sql)
        .bind(item_id)
        .bind(amount)
        .fetch_one(conn)
        .await
}
