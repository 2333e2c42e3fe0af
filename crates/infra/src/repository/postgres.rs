//! Postgres statement builder with the tenant predicate injected.

use sqlx::{Postgres, QueryBuilder};

use tenantgate_core::{Entity, TenantContext};

use super::Scope;
use crate::isolation::{IsolationError, Operation, TenantFilter, TenantIsolation};

/// Wraps a [`QueryBuilder`] whose `WHERE` clause already carries the tenant
/// filter for `E`. Callers append further predicates with [`ScopedQuery::and`].
pub struct ScopedQuery {
    builder: QueryBuilder<'static, Postgres>,
}

impl ScopedQuery {
    /// `SELECT {columns} FROM {table} WHERE ...`
    pub fn select<E: Entity>(ctx: &TenantContext, columns: &str) -> Result<Self, IsolationError> {
        let filter = TenantIsolation::scope::<E>(ctx, Operation::Read)?;
        Ok(Self::start::<E>(format!("SELECT {columns} FROM {}", E::TABLE), filter))
    }

    /// `UPDATE {table} SET {assignments} WHERE ...`. `assignments` is
    /// literal SQL (for example `title = EXCLUDED.title` or a column copy).
    pub fn update<E: Entity>(ctx: &TenantContext, assignments: &str) -> Result<Self, IsolationError> {
        let filter = TenantIsolation::scope::<E>(ctx, Operation::Update)?;
        Ok(Self::start::<E>(format!("UPDATE {} SET {assignments}", E::TABLE), filter))
    }

    pub fn delete<E: Entity>(ctx: &TenantContext) -> Result<Self, IsolationError> {
        let filter = TenantIsolation::scope::<E>(ctx, Operation::Delete)?;
        Ok(Self::start::<E>(format!("DELETE FROM {}", E::TABLE), filter))
    }

    fn start<E: Entity>(head: String, filter: TenantFilter) -> Self {
        let mut builder = QueryBuilder::new(head);
        builder.push(" WHERE TRUE");
        if let (Some(column), TenantFilter::Tenant(tenant)) = (E::TENANT_COLUMN, filter) {
            builder.push(format_args!(" AND {column} = "));
            builder.push_bind(tenant.as_str().to_owned());
        }
        Self { builder }
    }

    /// `AND {column} = $n`
    pub fn and<T>(mut self, column: &str, value: T) -> Self
    where
        T: 'static + Send + sqlx::Encode<'static, Postgres> + sqlx::Type<Postgres>,
    {
        self.builder.push(format_args!(" AND {column} = "));
        self.builder.push_bind(value);
        self
    }

    /// Apply a caller's explicit tenant predicate on top of the injected one.
    pub fn scoped<E: Entity>(mut self, scope: &Scope) -> Self {
        if let (Some(column), Scope::Tenants(tenants)) = (E::TENANT_COLUMN, scope) {
            let tenants: Vec<String> = tenants.iter().map(|t| t.as_str().to_owned()).collect();
            self.builder.push(format_args!(" AND {column} = ANY("));
            self.builder.push_bind(tenants);
            self.builder.push(")");
        }
        self
    }

    pub fn sql(&self) -> &str {
        self.builder.sql()
    }

    pub fn builder(&mut self) -> &mut QueryBuilder<'static, Postgres> {
        &mut self.builder
    }

    pub fn into_builder(self) -> QueryBuilder<'static, Postgres> {
        self.builder
    }
}
