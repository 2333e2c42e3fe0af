//! API-side guard for the cross-tenant capability.
//!
//! Acting inside a tenant other than the token's own is never the result of
//! a policy match; it is checked here, explicitly, before the gate enforces.

use tenantgate_auth::Enforcer;
use tenantgate_core::TenantId;

use crate::app::errors::ApiError;
use crate::context::RequestIdentity;

/// Retarget `identity` at `target` if the caller is a platform admin, i.e. a
/// user of the default domain holding `super_admin` there.
pub async fn authorize_cross_tenant(
    enforcer: &Enforcer,
    identity: RequestIdentity,
    target: TenantId,
) -> Result<RequestIdentity, ApiError> {
    if target == *identity.home_tenant() {
        return Ok(identity);
    }

    let subject = identity.claims().user_id.as_str();
    if !enforcer.is_platform_admin(identity.home_tenant(), subject).await? {
        tracing::warn!(
            target: "audit",
            user_id = subject,
            home_tenant = %identity.home_tenant(),
            requested_tenant = %target,
            "cross-tenant access refused"
        );
        return Err(ApiError::forbidden(
            "cross_tenant_denied",
            "cross-tenant access requires the platform admin capability",
        ));
    }

    tracing::info!(
        target: "audit",
        user_id = subject,
        home_tenant = %identity.home_tenant(),
        acting_tenant = %target,
        "cross-tenant access granted"
    );
    Ok(identity.acting_in(target))
}
