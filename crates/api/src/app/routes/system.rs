use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use chrono::DateTime;
use serde_json::json;

use tenantgate_core::TenantContext;

use crate::app::{errors::ApiError, services::AppServices};
use crate::context::RequestIdentity;

/// Healthy only when both backing stores answer.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Result<impl IntoResponse, ApiError> {
    services.tokens.ping().await?;
    services.enforcer.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(identity): Extension<RequestIdentity>,
) -> impl IntoResponse {
    let claims = identity.claims();
    Json(json!({
        "tenant_id": tenant.tenant_id().map(|t| t.as_str()),
        "home_tenant_id": identity.home_tenant().as_str(),
        "user_id": claims.user_id.as_str(),
        "role_id": claims.role_id.as_str(),
        "roles": claims.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "token_id": claims.token_id.to_string(),
        "expires_at": DateTime::from_timestamp(claims.exp, 0).map(|t| t.to_rfc3339()),
        "cross_tenant": identity.is_cross_tenant(),
    }))
}
