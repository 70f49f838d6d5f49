//! `ucaep-core`: shared building blocks for the UCAEP site backend.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{AccountId, AuditEntryId, SessionId};
