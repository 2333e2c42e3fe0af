use tenantgate_auth::IdentityClaims;
use tenantgate_core::TenantId;

/// Authenticated identity for a request, inserted by the gate.
///
/// The [`tenantgate_core::TenantContext`] derived from it travels alongside
/// as its own request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    claims: IdentityClaims,
    effective_tenant: TenantId,
}

impl RequestIdentity {
    pub fn new(claims: IdentityClaims) -> Self {
        let effective_tenant = claims.tenant_id.clone();
        Self {
            claims,
            effective_tenant,
        }
    }

    /// Act inside another tenant. Only the gate calls this, after the
    /// platform-admin capability has been checked.
    pub(crate) fn acting_in(mut self, tenant_id: TenantId) -> Self {
        self.effective_tenant = tenant_id;
        self
    }

    pub fn claims(&self) -> &IdentityClaims {
        &self.claims
    }

    /// Tenant the token was issued for.
    pub fn home_tenant(&self) -> &TenantId {
        &self.claims.tenant_id
    }

    /// Tenant the request operates on.
    pub fn tenant_id(&self) -> &TenantId {
        &self.effective_tenant
    }

    pub fn is_cross_tenant(&self) -> bool {
        self.effective_tenant != self.claims.tenant_id
    }
}
