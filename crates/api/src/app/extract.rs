//! Request body extraction with the API's own error shape.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};

use ucaep_auth::AuthError;

use crate::app::errors::ApiError;

/// Names a body may be missing; anything else is reported against `body`.
const BODY_FIELDS: &[&str] = &[
    "email",
    "password",
    "firstName",
    "lastName",
    "phone",
    "role",
    "status",
    "path",
    "ownerId",
    "requiredRole",
    "requiredLevel",
    "requiredPermissions",
];

/// `axum::Json` whose rejections are 400 `validation_error` responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_error(&rejection).into()),
        }
    }
}

fn rejection_error(rejection: &JsonRejection) -> AuthError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            AuthError::validation("body", "expected a JSON body (content-type: application/json)")
        }
        JsonRejection::JsonSyntaxError(_) => AuthError::validation("body", "malformed JSON body"),
        JsonRejection::JsonDataError(_) => {
            let detail = rejection.body_text();
            match missing_field(&detail) {
                Some(field) => AuthError::validation(field, format!("{field} is required")),
                None => AuthError::validation("body", data_error_message(&detail)),
            }
        }
        _ => AuthError::validation("body", "unreadable request body"),
    }
}

/// Field named by serde's "missing field `x`" message, if it is a known one.
fn missing_field(detail: &str) -> Option<&'static str> {
    let (_, rest) = detail.split_once("missing field `")?;
    let (name, _) = rest.split_once('`')?;
    BODY_FIELDS.iter().copied().find(|known| *known == name)
}

/// serde's message without axum's prefix.
fn data_error_message(detail: &str) -> String {
    match detail.split_once(": ") {
        Some((_, message)) => message.to_string(),
        None => detail.to_string(),
    }
}
