use axum::http::StatusCode;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::ledger::LedgerError;
use super::model::{RedemptionStatus, Voucher, VoucherRedemption};
use crate::db::{is_transient, Transient};

pub const REDEMPTION_CODE_PREFIX: &str = "RDM-";

#[derive(Debug, Error)]
pub enum VoucherError {
    #[error("voucher not found")]
    NotFound,
    #[error("voucher is not active")]
    Inactive,
    #[error("voucher is out of stock")]
    OutOfStock,
    #[error("voucher is not valid yet")]
    NotYetValid,
    #[error("voucher has expired")]
    Expired,
    #[error("insufficient points: {required} required, {available} available")]
    InsufficientPoints { required: i32, available: i32 },
    #[error("redemption not found")]
    RedemptionNotFound,
    #[error("redemption is {0:?}")]
    InvalidState(RedemptionStatus),
    #[error(transparent)]
    Ledger(LedgerError),
    #[error("storage: {0}")]
    Storage(#[from] sqlx::Error),
}

impl VoucherError {
    pub fn status(&self) -> StatusCode {
        match self {
            VoucherError::NotFound | VoucherError::RedemptionNotFound => StatusCode::NOT_FOUND,
            VoucherError::Inactive
            | VoucherError::OutOfStock
            | VoucherError::NotYetValid
            | VoucherError::Expired
            | VoucherError::InvalidState(_) => StatusCode::CONFLICT,
            VoucherError::InsufficientPoints { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            VoucherError::Ledger(e) => e.status(),
            VoucherError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Business-rule rejection, as opposed to a failure of the service.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, VoucherError::Storage(_) | VoucherError::Ledger(LedgerError::Storage(_)))
    }
}

impl From<LedgerError> for VoucherError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientPoints { required, available } => {
                VoucherError::InsufficientPoints { required, available }
            }
            LedgerError::Storage(e) => VoucherError::Storage(e),
            other => VoucherError::Ledger(other),
        }
    }
}

impl Transient for VoucherError {
    fn is_transient(&self) -> bool {
        matches!(self, VoucherError::Storage(e) if is_transient(e))
    }
}

/// Voucher-side checks, in order: active, stock, validity window.
pub fn check_redeemable(voucher: &Voucher, now: OffsetDateTime) -> Result<(), VoucherError> {
    if !voucher.is_active {
        return Err(VoucherError::Inactive);
    }
    if voucher.remaining_stock <= 0 {
        return Err(VoucherError::OutOfStock);
    }
    if now < voucher.valid_from {
        return Err(VoucherError::NotYetValid);
    }
    if now > voucher.valid_until {
        return Err(VoucherError::Expired);
    }
    Ok(())
}

pub fn check_affordable(voucher: &Voucher, available: i32) -> Result<(), VoucherError> {
    if available < voucher.points_required {
        return Err(VoucherError::InsufficientPoints {
            required: voucher.points_required,
            available,
        });
    }
    Ok(())
}

/// Only a stored-active, unexpired redemption can be used.
pub fn check_usable(
    redemption: &VoucherRedemption,
    now: OffsetDateTime,
) -> Result<(), VoucherError> {
    match redemption.effective_status(now) {
        RedemptionStatus::Active => Ok(()),
        other => Err(VoucherError::InvalidState(other)),
    }
}

/// `RDM-` followed by 16 upper-case hex digits of a fresh v4 UUID.
pub fn redemption_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{REDEMPTION_CODE_PREFIX}{}", hex[..16].to_uppercase())
}

/// A redemption lapses after `ttl_days`, or when the voucher does if sooner.
pub fn redemption_expiry(
    redeemed_at: OffsetDateTime,
    voucher: &Voucher,
    ttl_days: i64,
) -> OffsetDateTime {
    (redeemed_at + Duration::days(ttl_days)).min(voucher.valid_until)
}
