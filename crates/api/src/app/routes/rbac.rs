//! RBAC introspection, derived from the single role → permission table.
//!
//! These endpoints answer "what can this role do?" and "why would this
//! permission be denied?" without touching any account.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use ucaep_auth::{Permission, Role};

use crate::app::dto::ExplainQuery;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles))
        .route("/roles/:name", get(get_role))
        .route("/permissions", get(list_permissions))
        .route("/explain", get(explain))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /rbac/roles - all roles with their permissions, lowest first
pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> Response {
    (StatusCode::OK, Json(json!({ "roles": services.registry.roles }))).into_response()
}

/// GET /rbac/roles/:name
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> Response {
    let Ok(role) = name.parse::<Role>() else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found");
    };
    match services.registry.role(role) {
        Some(def) => (StatusCode::OK, Json(json!({ "role": def }))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
    }
}

/// GET /rbac/permissions - every permission and the roles granted it
pub async fn list_permissions(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let permissions: Vec<_> = services.registry.permissions.values().collect();
    (StatusCode::OK, Json(json!({ "permissions": permissions }))).into_response()
}

/// GET /rbac/explain?permission=news:publish[&role=producer]
///
/// Defaults to the caller's own role.
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ExplainQuery>,
) -> Response {
    if query.permission.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "permission is required",
        );
    }
    let role = query.role.unwrap_or(principal.role());
    let permission = Permission::new(query.permission.trim().to_string());
    let explanation = services.auth.authz().explain(role, &permission);
    (StatusCode::OK, Json(json!({ "explanation": explanation }))).into_response()
}
