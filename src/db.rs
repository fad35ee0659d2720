use std::{fmt::Display, future::Future, time::Duration};

use rand::Rng;
use serde::Deserialize;
use tracing::warn;

/// Unique index guarding redemption codes; a collision is retried with a new code.
pub const REDEMPTION_CODE_CONSTRAINT: &str = "voucher_redemptions_redemption_code_key";

/// Errors worth another attempt of the whole unit of work.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Serialization failures, deadlocks and redemption-code collisions.
pub fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("40001") | Some("40P01") => true,
            Some("23505") => db.constraint() == Some(REDEMPTION_CODE_CONSTRAINT),
            _ => false,
        },
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Runs `op` up to `attempts` times, sleeping a short jittered backoff
/// between transient failures. Each attempt must open its own transaction.
pub async fn with_retry<T, E, F, Fut>(attempts: u32, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < attempts => {
                let backoff = 25 * u64::from(attempt) + rand::thread_rng().gen_range(0..25);
                warn!(
                    attempt,
                    backoff_ms = backoff,
                    error = %e,
                    "transient storage failure, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

const MAX_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub fn page(&self) -> Page {
        Page {
            limit: self.limit.clamp(1, MAX_PAGE),
            offset: self.offset.max(0),
        }
    }
}
