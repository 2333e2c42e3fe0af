//! Postgres-backed policy store.
//!
//! Tuples carry their domain as a column, not a key prefix, because role
//! inheritance resolution reads across domains. Every batch mutation runs in
//! one transaction; `ON CONFLICT DO NOTHING` makes re-adding a no-op.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use tenantgate_auth::store::StoreResult;
use tenantgate_auth::{GroupingTuple, PolicyStore, PolicyTuple, StoreError};
use tenantgate_core::{RoleCode, TenantId};

const SCHEMA: &str = include_str!("../migrations/0001_policy.sql");

#[derive(Debug, Clone)]
pub struct PgPolicyStore {
    pool: PgPool,
}

fn map_sqlx_error(operation: &'static str, e: sqlx::Error) -> StoreError {
    tracing::error!(operation, error = %e, "policy store query failed");
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{operation}: {e}"))
        }
        other => StoreError::Unavailable(format!("{operation}: {other}")),
    }
}

impl PgPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the policy tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

fn strings<T: AsRef<str>>(values: &[T]) -> Vec<String> {
    values.iter().map(|v| v.as_ref().to_owned()).collect()
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn roles_of(&self, member: &str, domains: &[TenantId]) -> StoreResult<Vec<RoleCode>> {
        let rows = sqlx::query(
            r#"
            SELECT role
            FROM role_bindings
            WHERE member = $1 AND domain = ANY($2)
            ORDER BY created_at, role
            "#,
        )
        .bind(member)
        .bind(strings(domains))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_of", e))?;

        rows.into_iter()
            .map(|row| {
                row.try_get::<String, _>("role")
                    .map(RoleCode::from)
                    .map_err(|e| map_sqlx_error("roles_of", e))
            })
            .collect()
    }

    async fn policies_for(&self, roles: &[RoleCode], domain: &TenantId) -> StoreResult<Vec<PolicyTuple>> {
        let rows = sqlx::query(
            r#"
            SELECT role, domain, resource, action
            FROM policy_rules
            WHERE domain = $1 AND role = ANY($2)
            ORDER BY created_at
            "#,
        )
        .bind(domain.as_str())
        .bind(strings(roles))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("policies_for", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(PolicyTuple::new(
                    row.try_get::<String, _>("role")?,
                    row.try_get::<String, _>("domain")?,
                    row.try_get::<String, _>("resource")?,
                    row.try_get::<String, _>("action")?,
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("policies_for", e))
    }

    async fn add_groupings(&self, tuples: &[GroupingTuple]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("add_groupings", e))?;
        let mut added = 0;
        for g in tuples {
            let result = sqlx::query(
                "INSERT INTO role_bindings (member, role, domain) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(&g.member)
            .bind(g.role.as_str())
            .bind(g.domain.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_groupings", e))?;
            added += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("add_groupings", e))?;
        Ok(added)
    }

    async fn remove_groupings(&self, tuples: &[GroupingTuple]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("remove_groupings", e))?;
        let mut removed = 0;
        for g in tuples {
            let result = sqlx::query("DELETE FROM role_bindings WHERE member = $1 AND role = $2 AND domain = $3")
                .bind(&g.member)
                .bind(g.role.as_str())
                .bind(g.domain.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("remove_groupings", e))?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("remove_groupings", e))?;
        Ok(removed)
    }

    async fn add_policies(&self, tuples: &[PolicyTuple]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("add_policies", e))?;
        let mut added = 0;
        for p in tuples {
            let result = sqlx::query(
                "INSERT INTO policy_rules (role, domain, resource, action) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            )
            .bind(p.role.as_str())
            .bind(p.domain.as_str())
            .bind(&p.resource)
            .bind(&p.action)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_policies", e))?;
            added += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("add_policies", e))?;
        Ok(added)
    }

    async fn remove_policies(&self, tuples: &[PolicyTuple]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("remove_policies", e))?;
        let mut removed = 0;
        for p in tuples {
            let result = sqlx::query(
                "DELETE FROM policy_rules WHERE role = $1 AND domain = $2 AND resource = $3 AND action = $4",
            )
            .bind(p.role.as_str())
            .bind(p.domain.as_str())
            .bind(&p.resource)
            .bind(&p.action)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("remove_policies", e))?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("remove_policies", e))?;
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_both_tuple_tables() {
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS policy_rules"));
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS role_bindings"));
        assert!(SCHEMA.contains("PRIMARY KEY (member, role, domain)"));
    }

    #[test]
    fn decode_failures_are_corrupt_data() {
        let err = map_sqlx_error("roles_of", sqlx::Error::ColumnNotFound("role".into()));
        assert!(matches!(err, StoreError::Corrupt(_)));
        let err = map_sqlx_error("ping", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
