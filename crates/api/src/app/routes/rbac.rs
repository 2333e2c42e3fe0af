//! Role binding management inside the request's tenant.
//!
//! Who may call these is decided by policy like any other route; a typical
//! seed is `(tenant_admin, <tenant>, /rbac/*, *)`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use tenantgate_core::{RoleCode, TenantContext, TenantId, UserId};

use crate::app::{errors::ApiError, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/rbac/bindings", post(assign).delete(revoke))
        .route("/rbac/users/:user_id/roles", get(user_roles))
}

#[derive(Debug, Deserialize)]
pub struct BindingRequest {
    pub user_id: String,
    pub roles: Vec<String>,
}

impl BindingRequest {
    fn parse(self) -> Result<(UserId, Vec<RoleCode>), ApiError> {
        let user = self
            .user_id
            .parse::<UserId>()
            .map_err(|e| ApiError::BadRequest(format!("user_id: {e}")))?;
        if self.roles.is_empty() {
            return Err(ApiError::BadRequest("roles must not be empty".into()));
        }
        let roles = self
            .roles
            .into_iter()
            .map(|r| r.parse::<RoleCode>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::BadRequest(format!("roles: {e}")))?;
        Ok((user, roles))
    }
}

fn request_tenant(tenant: &TenantContext) -> Result<TenantId, ApiError> {
    tenant
        .tenant_id()
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("no tenant in request context".into()))
}

fn body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// POST /rbac/bindings
pub async fn assign(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    req: Result<Json<BindingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, roles) = body(req)?.parse()?;
    let domain = request_tenant(&tenant)?;
    let added = services.enforcer.assign_roles(&user, &roles, &domain).await?;
    Ok(Json(json!({
        "user_id": user.as_str(),
        "tenant_id": domain.as_str(),
        "added": added,
    })))
}

/// DELETE /rbac/bindings
pub async fn revoke(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    req: Result<Json<BindingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, roles) = body(req)?.parse()?;
    let domain = request_tenant(&tenant)?;
    let removed = services.enforcer.revoke_roles(&user, &roles, &domain).await?;
    Ok(Json(json!({
        "user_id": user.as_str(),
        "tenant_id": domain.as_str(),
        "removed": removed,
    })))
}

/// GET /rbac/users/:user_id/roles - direct bindings in the request tenant.
pub async fn user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = user_id
        .parse::<UserId>()
        .map_err(|e| ApiError::BadRequest(format!("user_id: {e}")))?;
    let domain = request_tenant(&tenant)?;
    let roles = services.enforcer.roles_for_user(&user, &domain).await?;
    Ok(Json(json!({
        "user_id": user.as_str(),
        "tenant_id": domain.as_str(),
        "roles": roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    })))
}
