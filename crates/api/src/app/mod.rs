//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage backends, token issuer, rate limiter
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `extract.rs`: JSON body extractor with validation-shaped rejections
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, middleware::from_fn_with_state};
use tower::ServiceBuilder;

use ucaep_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(AppServices::from_config(&config).await?);
    Ok(router(services))
}

/// Router over already-built services.
pub fn router(services: Arc<AppServices>) -> Router {
    // Layers run top to bottom: auth, then rate limit, then the route guard.
    let protected = routes::protected_router().layer(
        ServiceBuilder::new()
            .layer(Extension(services.clone()))
            .layer(from_fn_with_state(services.clone(), middleware::auth_middleware))
            .layer(from_fn_with_state(services.clone(), middleware::rate_limit_middleware))
            .layer(from_fn_with_state(services.clone(), middleware::route_guard_middleware)),
    );

    let public = routes::public_router().layer(
        ServiceBuilder::new()
            .layer(Extension(services.clone()))
            .layer(from_fn_with_state(services, middleware::rate_limit_middleware)),
    );

    Router::new().merge(public).merge(protected)
}
