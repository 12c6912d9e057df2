use actix_web::{delete, get, patch, post, web, HttpResponse};
use bson::doc;
use futures::{FutureExt, TryStreamExt};
use mongodb::options::FindOptions;

use super::{created, ok};
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::ledger::posting;
use crate::ledger::posting::{ExpenseUpdate, NewExpense};
use crate::schemas::Expense;
use crate::store::Store;

#[post("/expenses")]
pub async fn post_expense(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    json: web::Json<NewExpense>,
) -> Result<HttpResponse, ApiError> {
    let expense = store
        .run_transaction((user.0, json.into_inner()), |store, session, context| {
            let (actor, input) = context;
            posting::create_expense(store, session, actor, input).boxed()
        })
        .await?;
    Ok(created("expense created", expense))
}

#[patch("/expenses/{id}")]
pub async fn amend_expense(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    id: web::Path<String>,
    json: web::Json<ExpenseUpdate>,
) -> Result<HttpResponse, ApiError> {
    let expense = store
        .run_transaction(
            (user.0, id.into_inner(), json.into_inner()),
            |store, session, context| {
                let (actor, expense_id, update) = context;
                posting::amend_expense(store, session, actor, expense_id.as_str(), update).boxed()
            },
        )
        .await?;
    Ok(ok(expense))
}

#[delete("/expenses/{id}")]
pub async fn delete_expense(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    store
        .run_transaction((user.0, id.into_inner()), |store, session, context| {
            let (actor, expense_id) = context;
            posting::delete_expense(store, session, actor, expense_id.as_str()).boxed()
        })
        .await?;
    Ok(ok("expense deleted"))
}

#[get("/expenses/group/{group_id}")]
pub async fn list_group_expenses(
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
    let expenses: Vec<Expense> = store
        .expenses()
        .find(doc! { "group_id": &group.id }, options)
        .await?
        .try_collect()
        .await?;
    Ok(ok(expenses))
}

#[get("/expenses/{id}")]
pub async fn expense_details(
    store: web::Data<Store>,
    user: AuthenticatedUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let expense = store
        .expenses()
        .find_one(doc! { "_id": id.as_str() }, None)
        .await?
        .ok_or(ApiError::NotFound("expense"))?;
    let group = store
        .groups()
        .find_one(doc! { "_id": &expense.group_id }, None)
        .await?
        .ok_or(ApiError::NotFound("group"))?;
    if !group.is_member(&user.0) {
        return Err(ApiError::Authorization(
            "you are not authorized to view this expense".to_string(),
        ));
    }
    Ok(ok(expense))
}
