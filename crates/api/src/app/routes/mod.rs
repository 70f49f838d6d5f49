use axum::{
    Router,
    routing::{get, post, put},
};

pub mod access;
pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod rbac;
pub mod system;

/// Endpoints reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

/// Endpoints behind bearer authentication and the route guard.
pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/logout", post(auth::logout))
        .nest("/admin", admin::router())
        .nest("/rbac", rbac::router())
        .nest("/access", access::router())
        .nest("/dashboard", dashboard::router())
}
