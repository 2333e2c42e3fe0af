use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use tenantgate_core::{Entity, TenantContext};

use super::{RepositoryError, Scope, TenantRepository};
use crate::isolation::{IsolationError, Operation, TenantIsolation};

/// In-memory tenant-isolated repository for tests/dev.
#[derive(Debug)]
pub struct InMemoryRepository<E: Entity> {
    inner: RwLock<HashMap<E::Id, E>>,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned(e: impl std::fmt::Display) -> RepositoryError {
        RepositoryError::Database(format!("lock poisoned: {e}"))
    }
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> TenantRepository<E> for InMemoryRepository<E> {
    async fn insert(&self, ctx: &TenantContext, mut entity: E) -> Result<E, RepositoryError> {
        TenantIsolation::before_create(ctx, &mut entity)?;

        let mut map = self.inner.write().map_err(Self::poisoned)?;
        if map.contains_key(entity.id()) {
            return Err(RepositoryError::Duplicate { table: E::TABLE });
        }
        map.insert(entity.id().clone(), entity.clone());
        Ok(entity)
    }

    async fn get(&self, ctx: &TenantContext, id: &E::Id) -> Result<Option<E>, RepositoryError> {
        let filter = TenantIsolation::scope::<E>(ctx, Operation::Read)?;
        let map = self.inner.read().map_err(Self::poisoned)?;
        Ok(map.get(id).filter(|row| filter.matches(row.tenant_id())).cloned())
    }

    async fn list(&self, ctx: &TenantContext, scope: &Scope) -> Result<Vec<E>, RepositoryError> {
        let filter = TenantIsolation::scope::<E>(ctx, Operation::Read)?;
        let map = self.inner.read().map_err(Self::poisoned)?;
        Ok(map
            .values()
            .filter(|row| scope.admits_with(&filter, row.tenant_id()))
            .cloned()
            .collect())
    }

    async fn update(&self, ctx: &TenantContext, mut entity: E) -> Result<Option<E>, RepositoryError> {
        let filter = TenantIsolation::scope::<E>(ctx, Operation::Update)?;
        let mut map = self.inner.write().map_err(Self::poisoned)?;

        let Some(row) = map.get_mut(entity.id()) else {
            return Ok(None);
        };
        if !filter.matches(row.tenant_id()) {
            return Ok(None);
        }

        if let Some(owner) = row.tenant_id().cloned() {
            match entity.tenant_id() {
                Some(t) if *t != owner => {
                    return Err(IsolationError::TenantConflict {
                        table: E::TABLE,
                        existing: owner,
                        current: t.clone(),
                    }
                    .into());
                }
                Some(_) => {}
                None => entity.set_tenant_id(owner),
            }
        }

        *row = entity.clone();
        Ok(Some(entity))
    }

    async fn delete(&self, ctx: &TenantContext, id: &E::Id) -> Result<bool, RepositoryError> {
        let filter = TenantIsolation::scope::<E>(ctx, Operation::Delete)?;
        let mut map = self.inner.write().map_err(Self::poisoned)?;

        let visible = map.get(id).is_some_and(|row| filter.matches(row.tenant_id()));
        if visible {
            map.remove(id);
        }
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolation::fixtures::{Currency, Document};
    use tenantgate_core::{Classify, ErrorKind, TenantId};

    fn ctx(tenant: &'static str) -> TenantContext {
        TenantContext::for_tenant(TenantId::from(tenant))
    }

    #[tokio::test]
    async fn write_under_one_tenant_is_invisible_to_another() {
        let repo = InMemoryRepository::<Document>::new();
        repo.insert(&ctx("acme"), Document::new(1, "plan")).await.unwrap();

        assert!(repo.get(&ctx("acme"), &1).await.unwrap().is_some());
        assert!(repo.get(&ctx("globex"), &1).await.unwrap().is_none());
        assert!(repo.list(&ctx("globex"), &Scope::All).await.unwrap().is_empty());
        assert_eq!(repo.list(&ctx("acme"), &Scope::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_without_tenant_fails_and_writes_nothing() {
        let repo = InMemoryRepository::<Document>::new();
        let err = repo
            .insert(&TenantContext::anonymous(), Document::new(1, "plan"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let all = repo
            .list(&TenantContext::anonymous().skip_isolation(), &Scope::All)
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn read_without_tenant_fails_instead_of_returning_everything() {
        let repo = InMemoryRepository::<Document>::new();
        repo.insert(&ctx("acme"), Document::new(1, "plan")).await.unwrap();

        assert!(matches!(
            repo.list(&TenantContext::anonymous(), &Scope::All).await,
            Err(RepositoryError::Isolation(IsolationError::MissingTenant { .. }))
        ));
    }

    #[tokio::test]
    async fn cross_tenant_update_and_delete_are_no_ops() {
        let repo = InMemoryRepository::<Document>::new();
        repo.insert(&ctx("acme"), Document::new(1, "plan")).await.unwrap();

        let mut hijack = Document::new(1, "hijacked");
        hijack.tenant_id = None;
        assert!(repo.update(&ctx("globex"), hijack).await.unwrap().is_none());
        assert!(!repo.delete(&ctx("globex"), &1).await.unwrap());

        let row = repo.get(&ctx("acme"), &1).await.unwrap().unwrap();
        assert_eq!(row.title, "plan");
    }

    #[tokio::test]
    async fn update_keeps_the_owning_tenant() {
        let repo = InMemoryRepository::<Document>::new();
        repo.insert(&ctx("acme"), Document::new(1, "plan")).await.unwrap();

        let updated = repo
            .update(&ctx("acme"), Document::new(1, "final"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.tenant_id, Some(TenantId::from("acme")));

        // A skip-mode caller still cannot move the row.
        let mut moved = Document::new(1, "moved");
        moved.tenant_id = Some(TenantId::from("globex"));
        assert!(matches!(
            repo.update(&ctx("acme").skip_isolation(), moved).await,
            Err(RepositoryError::Isolation(IsolationError::TenantConflict { .. }))
        ));
    }

    #[tokio::test]
    async fn manual_mode_trusts_the_explicit_scope() {
        let repo = InMemoryRepository::<Document>::new();
        repo.insert(&ctx("acme"), Document::new(1, "a")).await.unwrap();
        repo.insert(&ctx("globex"), Document::new(2, "b")).await.unwrap();
        let mut template = Document::new(3, "template");
        template.tenant_id = Some(TenantId::default_domain());
        repo.insert(&ctx("acme").manual_isolation(), template).await.unwrap();

        // Tenant overrides merged with default-domain templates.
        let scope = Scope::Tenants(vec![TenantId::from("acme"), TenantId::default_domain()]);
        let mut ids: Vec<u32> = repo
            .list(&ctx("acme").manual_isolation(), &scope)
            .await
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);

        // In default mode the same scope is narrowed to the context tenant.
        let ids: Vec<u32> = repo
            .list(&ctx("acme"), &scope)
            .await
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn shared_entities_need_no_tenant() {
        let repo = InMemoryRepository::<Currency>::new();
        let anonymous = TenantContext::anonymous();
        repo.insert(&anonymous, Currency { code: "USD".into() }).await.unwrap();
        assert!(repo.get(&anonymous, &"USD".to_string()).await.unwrap().is_some());
        assert!(matches!(
            repo.insert(&anonymous, Currency { code: "USD".into() }).await,
            Err(RepositoryError::Duplicate { table: "currencies" })
        ));
    }
}
