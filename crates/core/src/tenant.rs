//! Request-scoped tenant context.
//!
//! Created once per inbound request (by the gate, from verified claims) and
//! passed by reference to every persistence call. It is never stored globally
//! and never persisted.

use crate::TenantId;

/// Which isolation rule the persistence hook applies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// Stamp creates and filter reads/updates/deletes by the current tenant.
    #[default]
    Default,
    /// Privileged/bootstrap flows: no stamping, no filtering.
    Skip,
    /// Caller supplies tenant values and predicates explicitly.
    Manual,
}

/// Tenant context for a request.
///
/// Exactly one [`IsolationMode`] is active at a time. The escape hatches
/// return a new context so the caller's own context is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TenantContext {
    current_tenant: Option<TenantId>,
    mode: IsolationMode,
}

impl TenantContext {
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            current_tenant: Some(tenant_id),
            mode: IsolationMode::Default,
        }
    }

    /// Default mode without a tenant; any tenant-owned access will fail.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn skip_isolation(&self) -> Self {
        Self {
            current_tenant: self.current_tenant.clone(),
            mode: IsolationMode::Skip,
        }
    }

    pub fn manual_isolation(&self) -> Self {
        Self {
            current_tenant: self.current_tenant.clone(),
            mode: IsolationMode::Manual,
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.current_tenant.as_ref()
    }

    pub fn mode(&self) -> IsolationMode {
        self.mode
    }
}
