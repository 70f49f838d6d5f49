//! Request pipeline: bearer authentication, rate limiting, route guard.
//!
//! Protected routes run `auth_middleware → rate_limit_middleware →
//! route_guard_middleware → handler`. Public routes only get rate limiting.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use ucaep_auth::{AccessRequirements, AuditAction, AuditEntry, AuthError, GuardDecision};
use ucaep_infra::RateDecision;

use crate::app::errors::{ApiError, denial_response, rate_limited_response};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Verify the bearer token, load the live account, refresh the session.
///
/// Any failure resolves to an audited guard denial (`session_expired` for
/// stale credentials, `not_authenticated` otherwise) and a 401 carrying the
/// specific error code.
pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let now = Utc::now();
    let path = req.uri().path().to_string();

    let result = match extract_bearer(req.headers()) {
        Some(token) => services.auth.authenticate(token, now).await,
        None => Err(AuthError::TokenInvalid),
    };

    match result {
        Ok(authenticated) => {
            req.extensions_mut().insert(PrincipalContext::from(authenticated));
            next.run(req).await
        }
        Err(err) if err.is_unauthenticated() || matches!(err, AuthError::AccountInactive) => {
            services.auth.reject_authentication(&path, &err, now).await;
            ApiError::from(err).return_to(path).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Enforce the route security rules for the authenticated caller.
pub async fn route_guard_middleware(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Response {
    let principal = req.extensions().get::<PrincipalContext>().cloned();
    let outcome = services
        .auth
        .evaluate_access(
            principal.as_ref().map(|p| p.account()),
            req.uri().path(),
            &AccessRequirements::none(),
            Utc::now(),
        )
        .await;

    match &outcome.decision {
        GuardDecision::Allow => next.run(req).await,
        GuardDecision::Deny(denial) => denial_response(denial),
        // Server-side identity is always resolved by now.
        GuardDecision::Loading => ApiError::from(AuthError::TokenInvalid).into_response(),
    }
}

/// Fixed-window limit per actor (or client address) and action.
///
/// Anonymous callers are keyed by peer address. `X-Forwarded-For` is only
/// believed when the peer is a configured trusted proxy. Limiter failures let
/// the request through.
pub async fn rate_limit_middleware(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Response {
    let now = Utc::now();
    let principal = req.extensions().get::<PrincipalContext>().cloned();
    let actor = match &principal {
        Some(p) => p.account_id().to_string(),
        None => {
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip());
            match client_address(req.headers(), peer, &services.trusted_proxies) {
                Some(ip) => ip.to_string(),
                None => "anonymous".to_string(),
            }
        }
    };
    let action = format!("{} {}", req.method(), req.uri().path());
    let key = format!("{actor}:{action}");

    match services.limiter.check(&key, now).await {
        Ok(RateDecision::Allowed { .. }) => next.run(req).await,
        Ok(RateDecision::Limited { retry_after }) => {
            services
                .auth
                .record(AuditEntry::new(
                    AuditAction::RateLimited,
                    req.uri().path(),
                    principal.as_ref().map(|p| p.account_id()),
                    principal.as_ref().map(|p| p.role()),
                    json!({ "action": action, "retry_after_secs": retry_after.as_secs() }),
                    now,
                ))
                .await;
            rate_limited_response(retry_after)
        }
        Err(e) => {
            warn!(error = %e, "rate limiter unavailable; allowing request");
            next.run(req).await
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Address of the calling client.
///
/// For a trusted peer, `X-Forwarded-For` is read right to left and the first
/// hop that is not itself a trusted proxy wins.
fn client_address(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted: &[IpAddr],
) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted.contains(&peer) {
        return Some(peer);
    }
    let forwarded = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .collect::<Vec<_>>();
    let client = forwarded
        .iter()
        .rev()
        .filter_map(|hop| hop.parse::<IpAddr>().ok())
        .find(|ip| !trusted.contains(ip));
    Some(client.unwrap_or(peer))
}
