use thiserror::Error;

use ucaep_core::DomainError;

use crate::claims::TokenValidationError;

/// Authentication/authorization failure taxonomy.
///
/// Everything except `ServerConfiguration` is recoverable by the caller.
/// `InvalidCredentials` deliberately covers both "no such account" and
/// "wrong password".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("token has expired")]
    TokenExpired,

    #[error("token is invalid")]
    TokenInvalid,

    #[error("session has expired")]
    SessionExpired,

    #[error("missing permission '{0}'")]
    InsufficientPermissions(String),

    #[error("role '{required}' required")]
    InsufficientRole { required: String },

    #[error("security level '{required}' required")]
    InsufficientSecurityLevel { required: String },

    #[error("account not found")]
    NotFound,

    #[error("server configuration error: {0}")]
    ServerConfiguration(String),

    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),
}

impl AuthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::DuplicateEmail => "duplicate_email",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountInactive => "account_inactive",
            Self::TokenExpired => "token_expired",
            Self::TokenInvalid => "token_invalid",
            Self::SessionExpired => "session_expired",
            Self::InsufficientPermissions(_) => "insufficient_permissions",
            Self::InsufficientRole { .. } => "insufficient_role",
            Self::InsufficientSecurityLevel { .. } => "insufficient_security_level",
            Self::NotFound => "not_found",
            Self::ServerConfiguration(_) => "server_configuration_error",
            Self::DatabaseUnavailable(_) => "database_unavailable",
        }
    }

    /// True for failures that mean "treat the caller as unauthenticated".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::TokenExpired
                | Self::TokenInvalid
                | Self::SessionExpired
        )
    }
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation { field, message } => Self::Validation { field, message },
            DomainError::InvalidId(msg) => Self::validation("id", msg),
            DomainError::InvariantViolation(msg) => Self::validation("request", msg),
        }
    }
}

impl From<TokenValidationError> for AuthError {
    fn from(value: TokenValidationError) -> Self {
        match value {
            TokenValidationError::Expired => Self::TokenExpired,
            TokenValidationError::NotYetValid | TokenValidationError::InvalidTimeWindow => {
                Self::TokenInvalid
            }
        }
    }
}
