//! HTTP API: server wiring, bearer authentication, route guard enforcement,
//! and request/response mapping.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
