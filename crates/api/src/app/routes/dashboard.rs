//! Dashboard sections. Access per section comes from the route security
//! rules, enforced by the guard middleware before these handlers run.

use std::sync::Arc;

use axum::{Json, Router, extract::Extension, routing::get};
use serde_json::{Value, json};

use ucaep_auth::{Identity, check_route_access};

use crate::app::services::AppServices;
use crate::context::PrincipalContext;

const SECTIONS: [&str; 4] = ["producer", "content", "moderation", "admin"];

pub fn router() -> Router {
    Router::new()
        .route("/", get(overview))
        .route("/producer", get(producer))
        .route("/content", get(content))
        .route("/moderation", get(moderation))
        .route("/admin", get(admin))
}

/// GET /dashboard - sections the caller may open
pub async fn overview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Json<Value> {
    let rules = services.auth.guard().rules();
    let identity = Identity {
        account_id: principal.account_id(),
        role: principal.role(),
        session_valid: true,
    };
    let sections: Vec<&str> = SECTIONS
        .into_iter()
        .filter(|s| {
            let level = rules.level_for(&format!("/dashboard/{s}"));
            check_route_access(services.auth.authz(), level, Some(&identity))
        })
        .collect();
    Json(json!({
        "role": principal.role(),
        "displayName": principal.account().display_name(),
        "sections": sections,
    }))
}

fn section(name: &str, principal: &PrincipalContext) -> Json<Value> {
    Json(json!({ "section": name, "role": principal.role() }))
}

/// GET /dashboard/producer
pub async fn producer(Extension(principal): Extension<PrincipalContext>) -> Json<Value> {
    section("producer", &principal)
}

/// GET /dashboard/content
pub async fn content(Extension(principal): Extension<PrincipalContext>) -> Json<Value> {
    section("content", &principal)
}

/// GET /dashboard/moderation
pub async fn moderation(Extension(principal): Extension<PrincipalContext>) -> Json<Value> {
    section("moderation", &principal)
}

/// GET /dashboard/admin
pub async fn admin(Extension(principal): Extension<PrincipalContext>) -> Json<Value> {
    section("admin", &principal)
}
