use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

pub async fn read_ids(db: &PgPool, user_id: Uuid) -> Result<HashSet<String>, sqlx::Error> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT notification_id
        FROM notification_reads
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(ids.into_iter().collect())
}

/// Idempotent.
pub async fn mark_read(
    db: &PgPool,
    user_id: Uuid,
    notification_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO notification_reads (user_id, notification_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, notification_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(notification_id)
    .execute(db)
    .await?;
    Ok(())
}
