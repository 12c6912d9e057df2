//! The balance ledger: expense posting, settlements, and the read-side
//! projections derived from a group's balance map. The posting and
//! settlement engines are the only writers of `Group::balances`; both run
//! inside store transactions so the map and the accompanying record either
//! persist together or not at all.

pub mod membership;
pub mod posting;
pub mod projection;
pub mod settlement;

use bson::doc;
use mongodb::ClientSession;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::ApiError;
use crate::schemas::Group;
use crate::store::Store;

/// Accepted monetary amounts are strictly positive whole cents. Returns the
/// amount in minor units; everything downstream works on exact integers so
/// the zero-sum invariant never meets rounding drift.
pub(crate) fn to_minor_units(amount: Decimal) -> Result<i64, ApiError> {
    let scaled = amount * Decimal::ONE_HUNDRED;
    if amount <= Decimal::ZERO || !scaled.fract().is_zero() {
        return Err(ApiError::Validation(format!(
            "amount {} must be positive with at most two decimal places",
            amount
        )));
    }
    scaled.to_i64().ok_or_else(|| {
        ApiError::Validation(format!("amount {} is out of range", amount))
    })
}

pub(crate) async fn load_group(
    store: &Store,
    session: &mut ClientSession,
    group_id: &str,
) -> Result<Group, ApiError> {
    store
        .groups()
        .find_one_with_session(doc! { "_id": group_id }, None, session)
        .await?
        .ok_or(ApiError::NotFound("group"))
}

pub(crate) async fn save_group(
    store: &Store,
    session: &mut ClientSession,
    group: &Group,
) -> Result<(), ApiError> {
    store
        .groups()
        .replace_one_with_session(doc! { "_id": &group.id }, group, None, session)
        .await?;
    Ok(())
}
