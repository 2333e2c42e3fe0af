//! Session endpoints. Issuing the first pair belongs to the login flow of the
//! identity service; this API only rotates and ends sessions.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use tenantgate_auth::{TokenPair, lifecycle::log_auth_failure};

use crate::app::{errors::ApiError, services::AppServices};
use crate::context::RequestIdentity;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/refresh - rotate a pair; the presented one is dead afterwards.
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let pair = services
        .tokens
        .refresh(req.refresh_token.trim())
        .await
        .inspect_err(log_auth_failure)?;
    Ok(Json(pair))
}

/// POST /auth/logout - end the session the access token belongs to.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<StatusCode, ApiError> {
    services.tokens.logout(identity.claims()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/logout-all - end every session of the caller in its home tenant.
pub async fn logout_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = identity.claims();
    let revoked = services
        .tokens
        .revoke_all_for_user(&claims.tenant_id, &claims.user_id)
        .await?;
    Ok(Json(json!({ "revoked": revoked })))
}
