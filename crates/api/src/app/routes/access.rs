//! Access decisions on demand, for UI guards that mirror the server.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    routing::post,
};
use chrono::Utc;
use serde_json::{Value, json};

use crate::app::dto::{AccessCheckRequest, AccessCheckResponse, CanEditRequest};
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/check", post(check))
        .route("/can-edit", post(can_edit))
}

/// POST /access/check - run the route guard for the caller against `path`
pub async fn check(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    JsonBody(body): JsonBody<AccessCheckRequest>,
) -> Json<AccessCheckResponse> {
    let outcome = services
        .auth
        .evaluate_access(Some(principal.account()), &body.path, &body.requirements, Utc::now())
        .await;
    Json(AccessCheckResponse {
        allowed: outcome.decision.is_allowed(),
        path: body.path,
        decision: outcome.decision,
    })
}

/// POST /access/can-edit - ownership override check
pub async fn can_edit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    JsonBody(body): JsonBody<CanEditRequest>,
) -> Json<Value> {
    let allowed = services
        .auth
        .authz()
        .can_edit_resource(principal.role(), body.owner_id, principal.account_id());
    Json(json!({ "allowed": allowed }))
}
