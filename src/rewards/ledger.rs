use axum::http::StatusCode;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{is_transient, Transient};

lazy_static! {
    static ref SOURCE_RE: Regex = Regex::new(r"^[a-z][a-z0-9_]{0,49}$").unwrap();
}

pub const SOURCE_FOOD_SAVE: &str = "food_save";
pub const SOURCE_DONATION: &str = "donation";
pub const SOURCE_VOUCHER_REDEEM: &str = "voucher_redeem";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("invalid source tag: {0:?}")]
    InvalidSource(String),
    #[error("points account not found")]
    AccountNotFound,
    #[error("insufficient points: {required} required, {available} available")]
    InsufficientPoints { required: i32, available: i32 },
    #[error("storage: {0}")]
    Storage(#[from] sqlx::Error),
}

impl LedgerError {
    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::InvalidAmount | LedgerError::InvalidSource(_) => StatusCode::BAD_REQUEST,
            LedgerError::AccountNotFound => StatusCode::NOT_FOUND,
            LedgerError::InsufficientPoints { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl Transient for LedgerError {
    fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Storage(e) if is_transient(e))
    }
}

/// Point balance of one account. `total == available + used` always holds
/// for values produced by `earn` and `spend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Balance {
    #[serde(rename = "total_points")]
    pub total: i32,
    #[serde(rename = "available_points")]
    pub available: i32,
    #[serde(rename = "used_points")]
    pub used: i32,
}

impl Balance {
    pub fn earn(self, amount: i32) -> Result<Balance, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let (Some(total), Some(available)) = (
            self.total.checked_add(amount),
            self.available.checked_add(amount),
        ) else {
            return Err(LedgerError::InvalidAmount);
        };
        Ok(Balance {
            total,
            available,
            used: self.used,
        })
    }

    pub fn spend(self, amount: i32) -> Result<Balance, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if self.available < amount {
            return Err(LedgerError::InsufficientPoints {
                required: amount,
                available: self.available,
            });
        }
        Ok(Balance {
            total: self.total,
            available: self.available - amount,
            used: self.used + amount,
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.available >= 0 && self.used >= 0 && self.total == self.available + self.used
    }
}

/// One ledger movement before it is written.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub amount: i32,
    pub source: String,
    pub description: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
}

impl LedgerEntry {
    pub fn new(amount: i32, source: &str) -> Self {
        Self {
            amount,
            source: source.to_string(),
            description: None,
            reference_id: None,
            reference_type: None,
        }
    }

    pub fn with_reference(mut self, id: Uuid, kind: &str) -> Self {
        self.reference_id = Some(id);
        self.reference_type = Some(kind.to_string());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Rejects the entry before anything is touched.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if !SOURCE_RE.is_match(&self.source) {
            return Err(LedgerError::InvalidSource(self.source.clone()));
        }
        Ok(())
    }
}
