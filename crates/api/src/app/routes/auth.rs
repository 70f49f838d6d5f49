//! Registration, login, and the caller's own account.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode};
use chrono::Utc;

use ucaep_auth::{ProfileUpdate, Registration, perms};

use crate::app::dto::{LoginRequest, LoginResponse, MeResponse, UserEnvelope};
use crate::app::errors::ApiError;
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::authz::require_permissions;
use crate::context::PrincipalContext;

/// POST /auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<Registration>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let account = services.auth.register(&body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(UserEnvelope::from(&account))))
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let outcome = services.auth.login(&body.email, &body.password, Utc::now()).await?;
    Ok(Json(LoginResponse {
        token: outcome.token,
        expires_at: outcome.expires_at,
        user: (&outcome.account).into(),
    }))
}

/// GET /auth/me
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<MeResponse>, ApiError> {
    require_permissions(services.auth.authz(), &principal, &[perms::PROFILE_READ])?;
    let permissions = services
        .auth
        .permissions_for(principal.role())
        .iter()
        .map(|p| p.to_string())
        .collect();
    Ok(Json(MeResponse {
        user: principal.account().into(),
        permissions,
    }))
}

/// PUT /auth/profile
pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    JsonBody(body): JsonBody<ProfileUpdate>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let account = services
        .auth
        .update_profile(principal.account(), &body, Utc::now())
        .await?;
    Ok(Json(UserEnvelope::from(&account)))
}

/// POST /auth/logout
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<StatusCode, ApiError> {
    services
        .auth
        .logout(principal.account(), principal.session(), Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
