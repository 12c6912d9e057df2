use actix_web::{delete, get, post, web, HttpResponse};
use bson::doc;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use futures::{FutureExt, TryStreamExt};
use mongodb::options::FindOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{created, ok};
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::ledger::membership;
use crate::ledger::membership::MemberAdditions;
use crate::ledger::projection::{project_group_debts, GroupDebtSummary};
use crate::schemas::{BalanceMap, Group, UserId};
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<UserId>,
}

#[derive(Serialize)]
struct GroupSummary {
    id: String,
    name: String,
    members_count: usize,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct GroupDetails {
    #[serde(flatten)]
    group: Group,
    members_count: usize,
    #[serde(flatten)]
    summary: GroupDebtSummary,
}

#[post("/groups")]
pub async fn create_group(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    json: web::Json<CreateGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = json.into_inner();
    let name = request.name.trim().to_string();
    if name.chars().count() < 3 || name.chars().count() > 50 {
        return Err(ApiError::Validation(
            "group name must be between 3 and 50 characters long".to_string(),
        ));
    }
    if matches!(&request.description, Some(text) if text.chars().count() > 200) {
        return Err(ApiError::Validation(
            "group description must be at most 200 characters long".to_string(),
        ));
    }

    // Creator first; the rest in given order, set semantics.
    let mut members = vec![user.0.clone()];
    for member in request.members {
        if !members.contains(&member) {
            members.push(member);
        }
    }
    // Every member carries an explicit zero so reverting the first expense
    // restores this exact map.
    let balances: BalanceMap = members
        .iter()
        .map(|member| (member.clone(), Decimal::ZERO))
        .collect();

    let now = Utc::now();
    let group = Group {
        id: ObjectId::new().to_hex(),
        name,
        description: request.description,
        created_by: user.0,
        members,
        balances,
        created_at: now,
        updated_at: now,
    };
    store.groups().insert_one(&group, None).await?;
    Ok(created("group created", group))
}

#[get("/groups")]
pub async fn list_groups(
    store: web::Data<Store>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let options = FindOptions::builder()
        .sort(doc! { "updated_at": -1 })
        .build();
    let groups: Vec<Group> = store
        .groups()
        .find(doc! { "members": &user.0 }, options)
        .await?
        .try_collect()
        .await?;
    let summaries: Vec<GroupSummary> = groups
        .into_iter()
        .map(|group| GroupSummary {
            id: group.id,
            name: group.name,
            members_count: group.members.len(),
            created_by: group.created_by,
            created_at: group.created_at,
            updated_at: group.updated_at,
        })
        .collect();
    Ok(ok(summaries))
}

#[get("/groups/{id}")]
pub async fn group_details(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let group = store
        .groups()
        .find_one(doc! { "_id": id.as_str() }, None)
        .await?
        .ok_or(ApiError::NotFound("group"))?;
    if !group.is_member(&user.0) {
        return Err(ApiError::Authorization(
            "you are not a member of this group".to_string(),
        ));
    }
    let summary = project_group_debts(&group, &user.0);
    Ok(ok(GroupDetails {
        members_count: group.members.len(),
        summary,
        group,
    }))
}

#[post("/groups/{id}/members")]
pub async fn add_members(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    id: web::Path<String>,
    json: web::Json<MemberAdditions>,
) -> Result<HttpResponse, ApiError> {
    let group = store
        .run_transaction(
            (user.0, id.into_inner(), json.into_inner()),
            |store, session, context| {
                let (actor, group_id, input) = context;
                membership::add_members(store, session, actor, group_id.as_str(), input).boxed()
            },
        )
        .await?;
    Ok(ok(group))
}

#[delete("/groups/{id}/members/{member_id}")]
pub async fn remove_member(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let group = store
        .run_transaction((user.0, path.into_inner()), |store, session, context| {
            let (actor, (group_id, member_id)) = context;
            membership::remove_member(store, session, actor, group_id.as_str(), member_id.as_str())
                .boxed()
        })
        .await?;
    Ok(ok(group))
}
