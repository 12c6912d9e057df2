use bson::doc;
use bson::oid::ObjectId;
use chrono::Utc;
use mongodb::ClientSession;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::info;

use super::{load_group, save_group, to_minor_units};
use crate::error::ApiError;
use crate::schemas::{BalanceMap, Expense, Group, UserId};
use crate::store::Store;

#[derive(Clone, Debug, Deserialize)]
pub struct NewExpense {
    pub group_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub participants: Option<Vec<UserId>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExpenseUpdate {
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Tri-state: absent leaves the description alone, an explicit null
    /// clears it, a string replaces it.
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub participants: Option<Vec<UserId>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Even split in minor units. The first `total mod n` participants, in stored
/// participant order, carry one extra cent, so the shares always sum to the
/// exact amount and the same inputs always produce the same shares. That
/// determinism is what makes reverting a stored expense an exact inverse.
fn expense_shares(amount: Decimal, participant_count: usize) -> Result<Vec<Decimal>, ApiError> {
    if participant_count == 0 {
        return Err(ApiError::Validation(
            "an expense needs at least one participant".to_string(),
        ));
    }
    let total = to_minor_units(amount)?;
    let count = participant_count as i64;
    let base = total / count;
    let remainder = (total % count) as usize;
    Ok((0..participant_count)
        .map(|index| Decimal::new(base + (index < remainder) as i64, 2))
        .collect())
}

/// Charges each participant their share and credits the payer with the full
/// amount. Net effect on the sum of the map is exactly zero. Fails before
/// touching the map.
pub fn apply_expense(
    balances: &mut BalanceMap,
    paid_by: &UserId,
    amount: Decimal,
    participants: &[UserId],
) -> Result<(), ApiError> {
    let shares = expense_shares(amount, participants.len())?;
    for (participant, share) in participants.iter().zip(shares) {
        *balances.entry(participant.clone()).or_default() -= share;
    }
    *balances.entry(paid_by.clone()).or_default() += amount;
    Ok(())
}

/// Exact inverse of `apply_expense` for the stored amount and participant
/// order. Amending is always revert-then-apply; diffing old against new
/// participant sets is how deltas go wrong.
pub fn revert_expense(
    balances: &mut BalanceMap,
    paid_by: &UserId,
    amount: Decimal,
    participants: &[UserId],
) -> Result<(), ApiError> {
    let shares = expense_shares(amount, participants.len())?;
    for (participant, share) in participants.iter().zip(shares) {
        *balances.entry(participant.clone()).or_default() += share;
    }
    *balances.entry(paid_by.clone()).or_default() -= amount;
    Ok(())
}

/// Participant lists have set semantics: duplicates collapse, order of first
/// appearance is kept (it decides who carries the remainder cents).
fn resolve_participants(group: &Group, requested: &[UserId]) -> Result<Vec<UserId>, ApiError> {
    if requested.is_empty() {
        return Err(ApiError::Validation(
            "an expense needs at least one participant".to_string(),
        ));
    }
    let outsiders: Vec<&UserId> = requested
        .iter()
        .filter(|participant| !group.is_member(participant))
        .collect();
    if !outsiders.is_empty() {
        return Err(ApiError::Validation(format!(
            "some participants are not members of the group: {}",
            outsiders
                .iter()
                .map(|participant| participant.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    let mut participants = Vec::with_capacity(requested.len());
    for participant in requested {
        if !participants.contains(participant) {
            participants.push(participant.clone());
        }
    }
    Ok(participants)
}

pub async fn create_expense(
    store: &Store,
    session: &mut ClientSession,
    actor: &UserId,
    input: &NewExpense,
) -> Result<Expense, ApiError> {
    let mut group = load_group(store, session, &input.group_id).await?;
    if !group.is_member(actor) {
        return Err(ApiError::Authorization(
            "the payer is not a member of the group".to_string(),
        ));
    }
    let participants = match &input.participants {
        Some(requested) => resolve_participants(&group, requested)?,
        None => group.members.clone(),
    };

    apply_expense(&mut group.balances, actor, input.amount, &participants)?;

    let now = Utc::now();
    let expense = Expense {
        id: ObjectId::new().to_hex(),
        group_id: group.id.clone(),
        paid_by: actor.clone(),
        amount: input.amount,
        description: input.description.clone(),
        participants,
        created_at: now,
        updated_at: now,
    };
    store
        .expenses()
        .insert_one_with_session(&expense, None, session)
        .await?;
    group.updated_at = now;
    save_group(store, session, &group).await?;

    info!(group = %group.id, expense = %expense.id, amount = %expense.amount, "expense posted");
    Ok(expense)
}

pub async fn amend_expense(
    store: &Store,
    session: &mut ClientSession,
    actor: &UserId,
    expense_id: &str,
    update: &ExpenseUpdate,
) -> Result<Expense, ApiError> {
    let mut expense = store
        .expenses()
        .find_one_with_session(doc! { "_id": expense_id }, None, session)
        .await?
        .ok_or(ApiError::NotFound("expense"))?;
    let mut group = load_group(store, session, &expense.group_id).await?;
    authorize_change(&expense, &group, actor)?;

    // Validate everything up front so a rejected amendment provably touches
    // nothing, then revert the stored posting and re-apply the new one.
    if let Some(amount) = update.amount {
        to_minor_units(amount)?;
    }
    let new_participants = update
        .participants
        .as_ref()
        .map(|requested| resolve_participants(&group, requested))
        .transpose()?;

    revert_expense(
        &mut group.balances,
        &expense.paid_by,
        expense.amount,
        &expense.participants,
    )?;
    if let Some(amount) = update.amount {
        expense.amount = amount;
    }
    if let Some(description) = &update.description {
        expense.description = description.clone();
    }
    if let Some(participants) = new_participants {
        expense.participants = participants;
    }
    apply_expense(
        &mut group.balances,
        &expense.paid_by,
        expense.amount,
        &expense.participants,
    )?;

    let now = Utc::now();
    expense.updated_at = now;
    group.updated_at = now;
    store
        .expenses()
        .replace_one_with_session(doc! { "_id": &expense.id }, &expense, None, session)
        .await?;
    save_group(store, session, &group).await?;

    info!(group = %group.id, expense = %expense.id, amount = %expense.amount, "expense amended");
    Ok(expense)
}

pub async fn delete_expense(
    store: &Store,
    session: &mut ClientSession,
    actor: &UserId,
    expense_id: &str,
) -> Result<(), ApiError> {
    let expense = store
        .expenses()
        .find_one_with_session(doc! { "_id": expense_id }, None, session)
        .await?
        .ok_or(ApiError::NotFound("expense"))?;
    let mut group = load_group(store, session, &expense.group_id).await?;
    authorize_change(&expense, &group, actor)?;

    revert_expense(
        &mut group.balances,
        &expense.paid_by,
        expense.amount,
        &expense.participants,
    )?;
    store
        .expenses()
        .delete_one_with_session(doc! { "_id": &expense.id }, None, session)
        .await?;
    group.updated_at = Utc::now();
    save_group(store, session, &group).await?;

    info!(group = %group.id, expense = %expense.id, "expense deleted");
    Ok(())
}

fn authorize_change(expense: &Expense, group: &Group, actor: &UserId) -> Result<(), ApiError> {
    if expense.paid_by != *actor && group.created_by != *actor {
        return Err(ApiError::Authorization(
            "only the payer or the group creator can modify this expense".to_string(),
        ));
    }
    Ok(())
}
