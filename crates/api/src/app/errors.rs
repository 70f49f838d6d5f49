use std::time::Duration;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};

use ucaep_auth::guard::{LOGIN_PATH, UNAUTHORIZED_PATH};
use ucaep_auth::{AuthError, Denial};

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn login_redirect(return_to: Option<&str>) -> String {
    match return_to {
        Some(path) => format!("{LOGIN_PATH}?returnTo={path}"),
        None => LOGIN_PATH.to_string(),
    }
}

/// `AuthError` as an HTTP response.
///
/// Internal failures are reported generically; details go to the log only.
#[derive(Debug)]
pub struct ApiError {
    error: AuthError,
    return_to: Option<String>,
}

impl ApiError {
    /// Path to come back to after logging in (401 responses only).
    pub fn return_to(mut self, path: impl Into<String>) -> Self {
        self.return_to = Some(path.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            AuthError::Validation { .. } | AuthError::DuplicateEmail => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions(_)
            | AuthError::InsufficientRole { .. }
            | AuthError::InsufficientSecurityLevel { .. } => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::ServerConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match &self.error {
            AuthError::Validation { message, .. } => message.clone(),
            AuthError::TokenExpired | AuthError::TokenInvalid => "please log in".to_string(),
            AuthError::SessionExpired => {
                "your session has expired, please log in again".to_string()
            }
            AuthError::InsufficientPermissions(_) => "insufficient permissions".to_string(),
            AuthError::InsufficientSecurityLevel { required } if required == "admin" => {
                "admin access required".to_string()
            }
            AuthError::ServerConfiguration(_) => "internal server error".to_string(),
            AuthError::DatabaseUnavailable(_) => "service temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self {
            error,
            return_to: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.error {
            AuthError::ServerConfiguration(detail) | AuthError::DatabaseUnavailable(detail) => {
                tracing::error!(code = self.error.code(), detail = %detail, "request failed");
            }
            _ => tracing::debug!(code = self.error.code(), "request rejected"),
        }

        let mut body = Map::new();
        body.insert("error".into(), Value::from(self.error.code()));
        body.insert("message".into(), Value::from(self.message()));
        match &self.error {
            AuthError::Validation { field, .. } => {
                body.insert("field".into(), Value::from(*field));
            }
            AuthError::DuplicateEmail => {
                body.insert("field".into(), Value::from("email"));
            }
            _ => {}
        }
        let needs_login = status == StatusCode::UNAUTHORIZED
            && !matches!(self.error, AuthError::InvalidCredentials);
        if needs_login {
            let redirect = login_redirect(self.return_to.as_deref());
            body.insert("redirect".into(), Value::from(redirect));
        } else if status == StatusCode::FORBIDDEN {
            body.insert("redirect".into(), Value::from(UNAUTHORIZED_PATH));
        }

        (status, axum::Json(Value::Object(body))).into_response()
    }
}

/// Route guard denial as a response, with the status of its taxonomy entry.
pub fn denial_response(denial: &Denial) -> Response {
    let status = ApiError::from(denial.to_error()).status();
    let redirect = if status == StatusCode::UNAUTHORIZED {
        login_redirect(denial.redirect.return_to.as_deref())
    } else {
        denial.redirect.to.clone()
    };
    (
        status,
        axum::Json(json!({
            "error": denial.reason.code(),
            "message": denial.message,
            "redirect": redirect,
        })),
    )
        .into_response()
}

pub fn rate_limited_response(retry_after: Duration) -> Response {
    let mut response = json_error(
        StatusCode::TOO_MANY_REQUESTS,
        "rate_limited",
        "too many requests, slow down",
    );
    if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}
