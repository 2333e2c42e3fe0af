use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tenantgate_auth::{AuthError, PolicyError};
use tenantgate_core::{Classify, ErrorKind};

/// Every failure a handler or the gate can return.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Policy(PolicyError),
    /// Policy evaluated to deny, or a capability check failed.
    Forbidden { code: &'static str, message: String },
    BadRequest(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<PolicyError> for ApiError {
    fn from(e: PolicyError) -> Self {
        ApiError::Policy(e)
    }
}

impl ApiError {
    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::Auth(e) => Some(e.kind()),
            ApiError::Policy(e) => Some(e.kind()),
            ApiError::Forbidden { .. } => Some(ErrorKind::AuthorizationDenied),
            ApiError::BadRequest(_) => None,
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authentication | ErrorKind::ReplayOrTamper => StatusCode::UNAUTHORIZED,
        ErrorKind::AuthorizationDenied => StatusCode::FORBIDDEN,
        ErrorKind::Infrastructure => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            ApiError::Auth(e) => (e.code(), e.to_string()),
            ApiError::Policy(e) => ("policy_store_unavailable", e.to_string()),
            ApiError::Forbidden { code, message } => (*code, message.clone()),
            ApiError::BadRequest(message) => {
                return json_error(StatusCode::BAD_REQUEST, "invalid_request", "invalid_request", message.clone());
            }
        };

        let Some(kind) = self.kind() else {
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal_error", message);
        };

        // Infrastructure and configuration details stay in the logs.
        let message = match kind {
            ErrorKind::Infrastructure => {
                tracing::error!(code, error = %message, "request failed on infrastructure");
                "service temporarily unavailable".to_string()
            }
            ErrorKind::Configuration => {
                tracing::error!(code, error = %message, "request failed on configuration");
                "internal error".to_string()
            }
            _ => message,
        };

        let mut response = json_error(status_for(kind), code, kind.code(), message);
        if kind.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    kind: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "kind": kind,
            "message": message.into(),
        })),
    )
        .into_response()
}
