use bson::oid::ObjectId;
use chrono::Utc;
use mongodb::ClientSession;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::{load_group, save_group, to_minor_units};
use crate::error::ApiError;
use crate::schemas::{BalanceMap, Settlement, UserId};
use crate::store::Store;

#[derive(Clone, Debug, Deserialize)]
pub struct NewSettlement {
    pub group_id: String,
    pub to_user: UserId,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// Checks that `from` genuinely owes `to` and returns the outstanding
/// pairwise debt. Deliberately bilateral: it validates the two named
/// balances against the zero-sum map, it does not net debts through third
/// parties.
pub fn validate_settlement(
    balances: &BalanceMap,
    from: &UserId,
    to: &UserId,
    amount: Decimal,
) -> Result<Decimal, ApiError> {
    to_minor_units(amount)?;
    let from_balance = balances.get(from).copied().unwrap_or_default();
    let to_balance = balances.get(to).copied().unwrap_or_default();

    if from_balance.is_zero() && to_balance.is_zero() {
        return Err(ApiError::Conflict(
            "no outstanding balance in this group; add expenses first".to_string(),
        ));
    }
    if from_balance < Decimal::ZERO && to_balance > Decimal::ZERO {
        let actual_debt = from_balance.abs().min(to_balance);
        if amount > actual_debt {
            return Err(ApiError::Conflict(format!(
                "settlement amount {} exceeds outstanding debt {}",
                amount, actual_debt
            )));
        }
        Ok(actual_debt)
    } else if from_balance > Decimal::ZERO && to_balance < Decimal::ZERO {
        Err(ApiError::Conflict(
            "they owe you, not the other way around".to_string(),
        ))
    } else {
        Err(ApiError::Conflict(
            "no outstanding debt between these two users in this group".to_string(),
        ))
    }
}

/// Moves a validated payment through the map: the payer's debt shrinks
/// toward zero, the payee's credit shrinks by the same amount.
pub fn apply_settlement(balances: &mut BalanceMap, from: &UserId, to: &UserId, amount: Decimal) {
    *balances.entry(from.clone()).or_default() += amount;
    *balances.entry(to.clone()).or_default() -= amount;
}

pub async fn create_settlement(
    store: &Store,
    session: &mut ClientSession,
    actor: &UserId,
    input: &NewSettlement,
) -> Result<Settlement, ApiError> {
    if *actor == input.to_user {
        return Err(ApiError::Validation(
            "cannot settle with yourself".to_string(),
        ));
    }
    let mut group = load_group(store, session, &input.group_id).await?;
    if !group.is_member(actor) || !group.is_member(&input.to_user) {
        return Err(ApiError::Authorization(
            "both users must be members of the group".to_string(),
        ));
    }

    validate_settlement(&group.balances, actor, &input.to_user, input.amount)?;
    apply_settlement(&mut group.balances, actor, &input.to_user, input.amount);

    let now = Utc::now();
    let settlement = Settlement {
        id: ObjectId::new().to_hex(),
        group_id: group.id.clone(),
        from_user: actor.clone(),
        to_user: input.to_user.clone(),
        amount: input.amount,
        description: input.description.clone(),
        created_at: now,
    };
    store
        .settlements()
        .insert_one_with_session(&settlement, None, session)
        .await?;
    group.updated_at = now;
    save_group(store, session, &group).await?;

    info!(
        group = %group.id,
        from = %settlement.from_user,
        to = %settlement.to_user,
        amount = %settlement.amount,
        "settlement recorded"
    );
    Ok(settlement)
}
