use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::dto::{HistoryResponse, RedeemResponse, VoucherQuery};
use super::ledger::{Balance, LedgerError};
use super::model::{RedemptionDetails, Voucher};
use super::vouchers::VoucherError;
use crate::{auth::AuthUser, db::Pagination, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rewards/points", get(points))
        .route("/rewards/history", get(history))
        .route("/vouchers", get(list_vouchers))
        .route("/vouchers/:id", get(get_voucher))
        .route("/vouchers/:id/redeem", post(redeem))
        .route("/redemptions", get(list_redemptions))
        .route("/redemptions/active", get(active_redemptions))
        .route("/redemptions/:id/use", post(mark_used))
}

#[instrument(skip(state))]
pub async fn points(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Balance>, (StatusCode, String)> {
    state.rewards.balance(user_id).await.map(Json).map_err(ledger_failure)
}

#[instrument(skip(state))]
pub async fn history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    let page = p.page();
    let (transactions, total) = state
        .rewards
        .history(user_id, page)
        .await
        .map_err(ledger_failure)?;
    Ok(Json(HistoryResponse {
        transactions,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

#[instrument(skip(state))]
pub async fn list_vouchers(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(q): Query<VoucherQuery>,
) -> Result<Json<Vec<Voucher>>, (StatusCode, String)> {
    let (filter, p) = q.split();
    state
        .rewards
        .list_vouchers(&filter, p.page(), OffsetDateTime::now_utc())
        .await
        .map(Json)
        .map_err(voucher_failure)
}

#[instrument(skip(state))]
pub async fn get_voucher(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Voucher>, (StatusCode, String)> {
    state.rewards.voucher(id).await.map(Json).map_err(voucher_failure)
}

#[instrument(skip(state))]
pub async fn redeem(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RedeemResponse>), (StatusCode, String)> {
    let redeemed = state
        .rewards
        .redeem(user_id, id, OffsetDateTime::now_utc())
        .await
        .map_err(voucher_failure)?;
    Ok((
        StatusCode::CREATED,
        Json(RedeemResponse {
            redemption: redeemed.redemption,
            balance: redeemed.balance,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_redemptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<RedemptionDetails>>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let rows = state
        .rewards
        .redemptions(user_id, p.page())
        .await
        .map_err(voucher_failure)?;
    Ok(Json(rows.into_iter().map(|r| r.at(now)).collect()))
}

#[instrument(skip(state))]
pub async fn active_redemptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<RedemptionDetails>>, (StatusCode, String)> {
    state
        .rewards
        .active_redemptions(user_id, OffsetDateTime::now_utc())
        .await
        .map(Json)
        .map_err(voucher_failure)
}

#[instrument(skip(state))]
pub async fn mark_used(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RedemptionDetails>, (StatusCode, String)> {
    state
        .rewards
        .mark_used(user_id, id, OffsetDateTime::now_utc())
        .await
        .map(Json)
        .map_err(voucher_failure)
}

fn ledger_failure(e: LedgerError) -> (StatusCode, String) {
    match &e {
        LedgerError::Storage(err) => error!(error = %err, "ledger storage failure"),
        _ => info!(reason = %e, "ledger request rejected"),
    }
    (e.status(), e.to_string())
}

fn voucher_failure(e: VoucherError) -> (StatusCode, String) {
    if e.is_rejection() {
        info!(reason = %e, "voucher request rejected");
    } else {
        error!(error = %e, "voucher storage failure");
    }
    (e.status(), e.to_string())
}
