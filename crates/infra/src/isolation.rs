//! Tenant isolation interceptor.
//!
//! Every repository call on a tenant-owned entity passes through here. In
//! default mode a missing tenant is an error, never "no filter".

use thiserror::Error;

use tenantgate_core::{Classify, Entity, ErrorKind, IsolationMode, TenantContext, TenantId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IsolationError {
    #[error("no tenant in context for tenant-owned table '{table}'")]
    MissingTenant { table: &'static str },

    #[error("entity in '{table}' belongs to tenant '{existing}', context tenant is '{current}'")]
    TenantConflict {
        table: &'static str,
        existing: TenantId,
        current: TenantId,
    },
}

impl Classify for IsolationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Read,
    Update,
    Delete,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Predicate injected into a read/update/delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantFilter {
    Unscoped,
    Tenant(TenantId),
}

impl TenantFilter {
    pub fn matches(&self, row_tenant: Option<&TenantId>) -> bool {
        match self {
            TenantFilter::Unscoped => true,
            TenantFilter::Tenant(t) => row_tenant == Some(t),
        }
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        match self {
            TenantFilter::Unscoped => None,
            TenantFilter::Tenant(t) => Some(t),
        }
    }
}

pub struct TenantIsolation;

impl TenantIsolation {
    /// Stamp the owning tenant on a new row.
    ///
    /// Default mode never changes a tenant already present on the entity.
    pub fn before_create<E: Entity>(ctx: &TenantContext, entity: &mut E) -> Result<(), IsolationError> {
        if !E::is_tenant_owned() {
            return Ok(());
        }

        match ctx.mode() {
            IsolationMode::Default => {
                let current = ctx
                    .tenant_id()
                    .ok_or(IsolationError::MissingTenant { table: E::TABLE })?;
                match entity.tenant_id() {
                    Some(existing) if existing != current => Err(IsolationError::TenantConflict {
                        table: E::TABLE,
                        existing: existing.clone(),
                        current: current.clone(),
                    }),
                    Some(_) => Ok(()),
                    None => {
                        entity.set_tenant_id(current.clone());
                        Ok(())
                    }
                }
            }
            IsolationMode::Skip => {
                tracing::warn!(table = E::TABLE, operation = "create", "tenant isolation skipped");
                Ok(())
            }
            IsolationMode::Manual => {
                tracing::debug!(table = E::TABLE, operation = "create", "manual tenant isolation");
                Ok(())
            }
        }
    }

    pub fn scope<E: Entity>(ctx: &TenantContext, operation: Operation) -> Result<TenantFilter, IsolationError> {
        if !E::is_tenant_owned() {
            return Ok(TenantFilter::Unscoped);
        }

        match ctx.mode() {
            IsolationMode::Default => ctx
                .tenant_id()
                .cloned()
                .map(TenantFilter::Tenant)
                .ok_or(IsolationError::MissingTenant { table: E::TABLE }),
            IsolationMode::Skip => {
                tracing::warn!(
                    table = E::TABLE,
                    operation = operation.as_str(),
                    "tenant isolation skipped"
                );
                Ok(TenantFilter::Unscoped)
            }
            IsolationMode::Manual => {
                tracing::debug!(
                    table = E::TABLE,
                    operation = operation.as_str(),
                    "manual tenant isolation"
                );
                Ok(TenantFilter::Unscoped)
            }
        }
    }
}
