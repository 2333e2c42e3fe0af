//! Tenant-scoped repositories.
//!
//! Repositories never decide tenant filters themselves: every call takes the
//! request's [`TenantContext`] and routes it through [`TenantIsolation`].
//!
//! [`TenantIsolation`]: crate::isolation::TenantIsolation

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use tenantgate_core::{Classify, Entity, ErrorKind, TenantContext, TenantId};

use crate::isolation::{IsolationError, TenantFilter};

pub use memory::InMemoryRepository;
pub use postgres::ScopedQuery;

/// Caller-supplied tenant predicate.
///
/// Honoured as-is in skip/manual mode; AND-ed with the context tenant in
/// default mode, so it can only narrow a default-mode query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Tenants(Vec<TenantId>),
}

impl Scope {
    pub fn tenant(tenant_id: TenantId) -> Self {
        Scope::Tenants(vec![tenant_id])
    }

    pub fn admits(&self, row_tenant: Option<&TenantId>) -> bool {
        match self {
            Scope::All => true,
            Scope::Tenants(allowed) => row_tenant.is_some_and(|t| allowed.contains(t)),
        }
    }

    /// Row passes both the injected filter and this predicate.
    pub(crate) fn admits_with(&self, filter: &TenantFilter, row_tenant: Option<&TenantId>) -> bool {
        filter.matches(row_tenant) && self.admits(row_tenant)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error(transparent)]
    Isolation(#[from] IsolationError),

    #[error("duplicate key in '{table}'")]
    Duplicate { table: &'static str },

    #[error("database error: {0}")]
    Database(String),
}

impl Classify for RepositoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::Isolation(e) => e.kind(),
            RepositoryError::Duplicate { .. } => ErrorKind::Configuration,
            RepositoryError::Database(_) => ErrorKind::Infrastructure,
        }
    }
}

#[async_trait]
pub trait TenantRepository<E: Entity>: Send + Sync {
    /// Insert a new row; the tenant is stamped by the interceptor.
    async fn insert(&self, ctx: &TenantContext, entity: E) -> Result<E, RepositoryError>;

    async fn get(&self, ctx: &TenantContext, id: &E::Id) -> Result<Option<E>, RepositoryError>;

    async fn list(&self, ctx: &TenantContext, scope: &Scope) -> Result<Vec<E>, RepositoryError>;

    /// Replace a visible row. Returns `None` when no visible row has this id.
    /// The row's tenant never changes.
    async fn update(&self, ctx: &TenantContext, entity: E) -> Result<Option<E>, RepositoryError>;

    async fn delete(&self, ctx: &TenantContext, id: &E::Id) -> Result<bool, RepositoryError>;
}
