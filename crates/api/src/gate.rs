//! Request gate: authenticate the bearer token, establish the tenant context,
//! then authorize the request against the policy store.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use tenantgate_auth::{AuthError, lifecycle::log_auth_failure, strip_bearer};
use tenantgate_core::{TenantContext, TenantId};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::authorize_cross_tenant;
use crate::context::RequestIdentity;

/// Header through which a platform admin targets another tenant.
pub const TENANT_OVERRIDE_HEADER: &str = "x-tenant-id";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateMode {
    /// Verify the token and populate context only (self-service session routes).
    Authenticate,
    /// Additionally enforce `(user, tenant, path, method)` against policy.
    Enforce,
}

#[derive(Clone)]
pub struct GateState {
    pub services: Arc<AppServices>,
    pub mode: GateMode,
}

impl GateState {
    pub fn new(services: Arc<AppServices>, mode: GateMode) -> Self {
        Self { services, mode }
    }
}

pub async fn gate_middleware(
    State(state): State<GateState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    // The body is not `Sync`; only the head is borrowed across awaits.
    let (mut parts, body) = req.into_parts();
    match admit(&state, &parts).await {
        Ok((identity, tenant)) => {
            parts.extensions.insert(tenant);
            parts.extensions.insert(identity);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(e) => e.into_response(),
    }
}

async fn admit(
    state: &GateState,
    req: &Parts,
) -> Result<(RequestIdentity, TenantContext), ApiError> {
    let services = &state.services;

    let claims = async {
        let token = extract_bearer(&req.headers)?;
        services.tokens.verify_access(token).await
    }
    .await
    .inspect_err(log_auth_failure)?;

    let mut identity = RequestIdentity::new(claims);

    if let Some(target) = tenant_override(&req.headers)? {
        identity = authorize_cross_tenant(&services.enforcer, identity, target).await?;
    }

    let tenant = TenantContext::for_tenant(identity.tenant_id().clone());

    if state.mode == GateMode::Enforce {
        authorize(services, &identity, req).await?;
    }

    Ok((identity, tenant))
}

async fn authorize(
    services: &AppServices,
    identity: &RequestIdentity,
    req: &Parts,
) -> Result<(), ApiError> {
    let subject = identity.claims().user_id.as_str();
    let resource = req.uri.path();
    let action = req.method.as_str();

    // A platform admin acting elsewhere is authorized by the policies of the
    // domain its capability lives in; its home tenant policies otherwise.
    let domain = if identity.is_cross_tenant() {
        TenantId::default_domain()
    } else {
        identity.tenant_id().clone()
    };

    let decision = services.enforcer.enforce(subject, &domain, resource, action).await?;
    if decision.allowed {
        tracing::debug!(
            target: "audit",
            user_id = subject,
            %domain,
            resource,
            action,
            matched = ?decision.matched,
            "request authorized"
        );
        return Ok(());
    }

    tracing::debug!(
        target: "audit",
        user_id = subject,
        %domain,
        resource,
        action,
        roles = ?decision.roles,
        "request denied"
    );
    Err(ApiError::forbidden("access_denied", format!("{action} {resource} is not permitted")))
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::TokenInvalid("authorization header is not valid ASCII".into()))?;
    strip_bearer(header)
}

fn tenant_override(headers: &HeaderMap) -> Result<Option<TenantId>, ApiError> {
    let Some(value) = headers.get(TENANT_OVERRIDE_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("{TENANT_OVERRIDE_HEADER} is not valid ASCII")))?;
    raw.parse::<TenantId>()
        .map(Some)
        .map_err(|e| ApiError::BadRequest(format!("{TENANT_OVERRIDE_HEADER}: {e}")))
}
