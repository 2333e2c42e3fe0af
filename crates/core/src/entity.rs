//! Entity trait: identity + static tenancy for persisted records.

use crate::TenantId;

/// Persisted record contract consumed by repositories and the isolation hook.
///
/// Tenant ownership is a property of the *type* (`TENANT_COLUMN`), never of a
/// particular value or of the current isolation mode.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync + 'static;

    /// Backing table / collection name.
    const TABLE: &'static str;

    /// Column holding the owning tenant; `None` for shared entities.
    const TENANT_COLUMN: Option<&'static str> = None;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    fn tenant_id(&self) -> Option<&TenantId> {
        None
    }

    fn set_tenant_id(&mut self, _tenant_id: TenantId) {}

    fn is_tenant_owned() -> bool {
        Self::TENANT_COLUMN.is_some()
    }
}
