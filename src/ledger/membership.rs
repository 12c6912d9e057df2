use chrono::Utc;
use mongodb::ClientSession;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::{load_group, save_group};
use crate::error::ApiError;
use crate::schemas::{Group, UserId};
use crate::store::Store;

#[derive(Clone, Debug, Deserialize)]
pub struct MemberAdditions {
    pub member_ids: Vec<UserId>,
}

/// Admits each new user with an explicit zero balance entry, so a later
/// expense posted and then deleted restores the map exactly. Already-present
/// members are skipped.
pub fn admit_members(group: &mut Group, member_ids: &[UserId]) {
    for member in member_ids {
        if !group.is_member(member) {
            group.balances.insert(member.clone(), Decimal::ZERO);
            group.members.push(member.clone());
        }
    }
}

/// A member may only leave once their balance is exactly zero; anything else
/// would break the zero-sum of the remaining map. On success both the
/// membership entry and the balance key go.
pub fn retire_member(group: &mut Group, member_id: &str) -> Result<(), ApiError> {
    if !group.is_member(member_id) {
        return Err(ApiError::NotFound("member"));
    }
    if !group.balance_of(member_id).is_zero() {
        return Err(ApiError::Conflict(
            "cannot remove a member with an unsettled balance; settle up first".to_string(),
        ));
    }
    group.members.retain(|member| member != member_id);
    group.balances.remove(member_id);
    Ok(())
}

pub async fn add_members(
    store: &Store,
    session: &mut ClientSession,
    actor: &UserId,
    group_id: &str,
    input: &MemberAdditions,
) -> Result<Group, ApiError> {
    let mut group = load_group(store, session, group_id).await?;
    if group.created_by != *actor {
        return Err(ApiError::Authorization(
            "only the group creator can add members".to_string(),
        ));
    }

    admit_members(&mut group, &input.member_ids);
    group.updated_at = Utc::now();
    save_group(store, session, &group).await?;

    info!(group = %group.id, members = group.members.len(), "members added");
    Ok(group)
}

pub async fn remove_member(
    store: &Store,
    session: &mut ClientSession,
    actor: &UserId,
    group_id: &str,
    member_id: &str,
) -> Result<Group, ApiError> {
    let mut group = load_group(store, session, group_id).await?;
    if group.created_by != *actor && member_id != actor.as_str() {
        return Err(ApiError::Authorization(
            "only the group creator or the member themself can remove a member".to_string(),
        ));
    }

    retire_member(&mut group, member_id)?;
    group.updated_at = Utc::now();
    save_group(store, session, &group).await?;

    info!(group = %group.id, member = %member_id, "member removed");
    Ok(group)
}
