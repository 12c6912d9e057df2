use actix_web::{get, post, web, HttpResponse};
use bson::doc;
use futures::{FutureExt, TryStreamExt};
use mongodb::options::FindOptions;

use super::{created, ok};
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::ledger::projection::project_cross_group_debts;
use crate::ledger::settlement;
use crate::ledger::settlement::NewSettlement;
use crate::schemas::{Group, Settlement};
use crate::store::Store;

#[post("/settlements")]
pub async fn create_settlement(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    json: web::Json<NewSettlement>,
) -> Result<HttpResponse, ApiError> {
    let settlement = store
        .run_transaction((user.0, json.into_inner()), |store, session, context| {
            let (actor, input) = context;
            settlement::create_settlement(store, session, actor, input).boxed()
        })
        .await?;
    Ok(created("settlement recorded", settlement))
}

#[get("/settlements")]
pub async fn settlement_history(
    store: web::Data<Store>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let settlements: Vec<Settlement> = store
        .settlements()
        .find(
            doc! { "$or": [ { "from_user": &user.0 }, { "to_user": &user.0 } ] },
            options,
        )
        .await?
        .try_collect()
        .await?;
    Ok(ok(settlements))
}

#[get("/settlements/group/{group_id}")]
pub async fn group_settlements(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    group_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let group = store
        .groups()
        .find_one(doc! { "_id": group_id.as_str() }, None)
        .await?
        .ok_or(ApiError::NotFound("group"))?;
    if !group.is_member(&user.0) {
        return Err(ApiError::Authorization(
            "you are not a member of this group".to_string(),
        ));
    }

    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let settlements: Vec<Settlement> = store
        .settlements()
        .find(doc! { "group_id": &group.id }, options)
        .await?
        .try_collect()
        .await?;
    Ok(ok(settlements))
}

/// Aggregated "who owes whom" across every group the caller belongs to.
/// Snapshot read; no locks are taken.
#[get("/balances")]
pub async fn balance_overview(
    store: web::Data<Store>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let groups: Vec<Group> = store
        .groups()
        .find(doc! { "members": &user.0 }, None)
        .await?
        .try_collect()
        .await?;
    Ok(ok(project_cross_group_debts(&user.0, &groups)))
}
