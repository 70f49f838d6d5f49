//! Admin routes for account management and the audit trail.
//!
//! The route guard already requires role == admin for `/admin`; each handler
//! still goes through `AuthService`, which re-checks admin equality and the
//! specific permission.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, put},
};
use chrono::Utc;
use serde_json::{Value, json};

use ucaep_auth::Registration;
use ucaep_core::AccountId;

use crate::app::dto::{
    AccountView, AuditEntryView, AuditQuery, UpdateRoleRequest, UpdateStatusRequest, UserEnvelope,
};
use crate::app::errors::ApiError;
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/:id", get(get_account).delete(delete_account))
        .route("/accounts/:id/role", put(update_role))
        .route("/accounts/:id/status", put(update_status))
        .route("/audit", get(recent_audit))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/accounts
pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Value>, ApiError> {
    let accounts = services.auth.list_accounts(principal.account()).await?;
    let users: Vec<AccountView> = accounts.iter().map(AccountView::from).collect();
    Ok(Json(json!({ "users": users })))
}

/// POST /admin/accounts - create an account with any role
pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    JsonBody(body): JsonBody<Registration>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let account = services
        .auth
        .create_account(principal.account(), &body, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(UserEnvelope::from(&account))))
}

/// GET /admin/accounts/:id
pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<AccountId>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let account = services.auth.get_account(principal.account(), id).await?;
    Ok(Json(UserEnvelope::from(&account)))
}

/// PUT /admin/accounts/:id/role
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<AccountId>,
    JsonBody(body): JsonBody<UpdateRoleRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let role = body.parse()?;
    let account = services
        .auth
        .update_role(principal.account(), id, role, Utc::now())
        .await?;
    Ok(Json(UserEnvelope::from(&account)))
}

/// PUT /admin/accounts/:id/status
pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<AccountId>,
    JsonBody(body): JsonBody<UpdateStatusRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let status = body.parse()?;
    let account = services
        .auth
        .update_status(principal.account(), id, status, Utc::now())
        .await?;
    Ok(Json(UserEnvelope::from(&account)))
}

/// DELETE /admin/accounts/:id
pub async fn delete_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<AccountId>,
) -> Result<StatusCode, ApiError> {
    services
        .auth
        .delete_account(principal.account(), id, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/audit?limit=N - newest first
pub async fn recent_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
    let entries = services.auth.recent_audit(principal.account(), limit).await?;
    let entries: Vec<AuditEntryView> = entries.into_iter().map(AuditEntryView::from).collect();
    Ok(Json(json!({ "entries": entries })))
}
