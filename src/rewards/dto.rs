use serde::{Deserialize, Serialize};

use super::ledger::Balance;
use super::model::{PointTransaction, RedemptionDetails};
use super::store::VoucherFilter;
use crate::db::Pagination;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub transactions: Vec<PointTransaction>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct VoucherQuery {
    pub store: Option<String>,
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}

impl VoucherQuery {
    pub fn split(self) -> (VoucherFilter, Pagination) {
        let non_blank =
            |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        (
            VoucherFilter {
                store: non_blank(self.store),
                category: non_blank(self.category),
            },
            Pagination {
                limit: self.limit,
                offset: self.offset,
            },
        )
    }
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub redemption: RedemptionDetails,
    pub balance: Balance,
}
