use axum::http::StatusCode;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use super::dto::{DonateRequest, DonationResponse};
use super::model::{DonationDetails, DonationMarket, DonationStats};
use super::repo::{self, NewDonation};
use crate::{
    db::Page,
    pantry::{award, repo::PantryItem, PantryError},
    rewards::{ledger::SOURCE_DONATION, LedgerEntry},
    state::AppState,
};

const MAX_NOTES_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum DonationError {
    #[error("units must be at least 1")]
    InvalidUnits,
    #[error("notes must be at most {MAX_NOTES_LEN} characters")]
    NotesTooLong,
    #[error("donation market not found")]
    MarketNotFound,
    #[error("donation market is not accepting donations")]
    MarketInactive,
    #[error("cannot donate {requested} units, only {remaining} left")]
    InsufficientQuantity { requested: i32, remaining: f64 },
    #[error(transparent)]
    Pantry(#[from] PantryError),
}

impl From<sqlx::Error> for DonationError {
    fn from(e: sqlx::Error) -> Self {
        DonationError::Pantry(PantryError::Storage(e))
    }
}

impl DonationError {
    pub fn status(&self) -> StatusCode {
        match self {
            DonationError::InvalidUnits | DonationError::NotesTooLong => StatusCode::BAD_REQUEST,
            DonationError::MarketNotFound => StatusCode::NOT_FOUND,
            DonationError::MarketInactive => StatusCode::CONFLICT,
            DonationError::InsufficientQuantity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DonationError::Pantry(e) => e.status(),
        }
    }
}

/// Request checks that need no storage.
pub fn validate_request(req: &DonateRequest) -> Result<(), DonationError> {
    if req.units < 1 {
        return Err(DonationError::InvalidUnits);
    }
    if req
        .notes
        .as_deref()
        .is_some_and(|n| n.chars().count() > MAX_NOTES_LEN)
    {
        return Err(DonationError::NotesTooLong);
    }
    Ok(())
}

pub fn check_quantity(item: &PantryItem, units: i32) -> Result<(), DonationError> {
    if units < 1 {
        return Err(DonationError::InvalidUnits);
    }
    if f64::from(units) > item.quantity_remaining {
        return Err(DonationError::InsufficientQuantity {
            requested: units,
            remaining: item.quantity_remaining,
        });
    }
    Ok(())
}

pub fn check_market(market: Option<DonationMarket>) -> Result<DonationMarket, DonationError> {
    let market = market.ok_or(DonationError::MarketNotFound)?;
    if !market.is_active {
        return Err(DonationError::MarketInactive);
    }
    Ok(market)
}

pub fn donation_points(units: i32, per_unit: i32) -> i32 {
    units.saturating_mul(per_unit)
}

/// The donation row and the pantry decrement commit together. The point award
/// follows and is best effort, like every pantry award.
#[instrument(skip(state, req), fields(market_id = %req.market_id, units = req.units))]
pub async fn donate(
    state: &AppState,
    user_id: Uuid,
    item_id: Uuid,
    req: DonateRequest,
) -> Result<DonationResponse, DonationError> {
    validate_request(&req)?;
    let points = donation_points(req.units, state.config.rewards.points_per_donated_unit);
    let notes = req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());

    let (donation, item, market) = repo::create(
        &state.db,
        user_id,
        &NewDonation {
            item_id,
            market_id: req.market_id,
            units: req.units,
            points,
            notes,
        },
    )
    .await?;

    let entry = LedgerEntry::new(points, SOURCE_DONATION)
        .with_reference(donation.id, "donation")
        .with_description(format!(
            "Donated {} {} of {} to {}",
            req.units, item.unit, item.name, market.name
        ));
    let points_awarded = award(state.rewards.as_ref(), user_id, entry).await;

    Ok(DonationResponse {
        donation,
        item,
        points_awarded,
    })
}

pub async fn markets(state: &AppState) -> Result<Vec<DonationMarket>, DonationError> {
    Ok(repo::active_markets(&state.db).await?)
}

pub async fn history(
    state: &AppState,
    user_id: Uuid,
    page: Page,
) -> Result<Vec<DonationDetails>, DonationError> {
    Ok(repo::by_user(&state.db, user_id, page).await?)
}

pub async fn stats(state: &AppState, user_id: Uuid) -> Result<DonationStats, DonationError> {
    Ok(repo::stats(&state.db, user_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::donations::model::fixtures::market;
    use crate::pantry::repo::fixtures::item;

    fn request(units: i32, notes: Option<&str>) -> DonateRequest {
        DonateRequest {
            market_id: Uuid::new_v4(),
            units,
            notes: notes.map(Into::into),
        }
    }

    #[test]
    fn request_needs_units_and_short_notes() {
        assert!(validate_request(&request(2, Some("for dinner"))).is_ok());
        assert!(matches!(
            validate_request(&request(0, None)),
            Err(DonationError::InvalidUnits)
        ));
        let long = "x".repeat(MAX_NOTES_LEN + 1);
        assert!(matches!(
            validate_request(&request(1, Some(&long))),
            Err(DonationError::NotesTooLong)
        ));
    }

    #[test]
    fn donation_cannot_exceed_remaining() {
        assert!(check_quantity(&item(3.0), 3).is_ok());
        let err = check_quantity(&item(2.5), 3).unwrap_err();
        assert!(matches!(
            err,
            DonationError::InsufficientQuantity { requested: 3, .. }
        ));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(matches!(
            check_quantity(&item(3.0), 0),
            Err(DonationError::InvalidUnits)
        ));
    }

    #[test]
    fn market_must_exist_and_be_active() {
        let open = market(true);
        let id = open.id;
        assert_eq!(check_market(Some(open)).unwrap().id, id);

        let err = check_market(None).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = check_market(Some(market(false))).unwrap_err();
        assert!(matches!(err, DonationError::MarketInactive));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn pantry_errors_keep_their_status() {
        let err: DonationError = PantryError::NotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err: DonationError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn donation_points_scale_per_unit() {
        assert_eq!(donation_points(3, 10), 30);
        assert_eq!(donation_points(i32::MAX, 10), i32::MAX);
    }
}
