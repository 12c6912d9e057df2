pub mod expense;
pub mod group;
pub mod settlement;

use actix_web::{web, HttpResponse};
use serde::Serialize;

/// Success envelope shared by every endpoint; errors use the body built by
/// `crate::error`.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    data: T,
}

fn ok(data: impl Serialize) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse {
        success: true,
        message: None,
        data,
    })
}

fn created(message: &'static str, data: impl Serialize) -> HttpResponse {
    HttpResponse::Created().json(ApiResponse {
        success: true,
        message: Some(message),
        data,
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(group::create_group)
        .service(group::list_groups)
        .service(group::group_details)
        .service(group::add_members)
        .service(group::remove_member)
        .service(expense::post_expense)
        .service(expense::list_group_expenses)
        .service(expense::expense_details)
        .service(expense::amend_expense)
        .service(expense::delete_expense)
        .service(settlement::create_settlement)
        .service(settlement::settlement_history)
        .service(settlement::group_settlements)
        .service(settlement::balance_overview);
}
