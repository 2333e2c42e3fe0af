use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tenantgate_core::{RoleCode, TenantId};

use super::model::{GroupingTuple, PolicyTuple};
use crate::store::{StoreError, StoreResult};

/// Persistent home of policy and grouping tuples.
///
/// Batch mutations are all-or-nothing: a concurrent reader observes either
/// none or all of a batch. Adding an existing tuple or removing a missing one
/// is not an error; the returned count reflects rows actually changed.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Roles `member` directly holds in any of `domains`.
    async fn roles_of(&self, member: &str, domains: &[TenantId]) -> StoreResult<Vec<RoleCode>>;

    /// Policy tuples of any of `roles` written against exactly `domain`.
    async fn policies_for(&self, roles: &[RoleCode], domain: &TenantId) -> StoreResult<Vec<PolicyTuple>>;

    async fn add_groupings(&self, tuples: &[GroupingTuple]) -> StoreResult<usize>;

    async fn remove_groupings(&self, tuples: &[GroupingTuple]) -> StoreResult<usize>;

    async fn add_policies(&self, tuples: &[PolicyTuple]) -> StoreResult<usize>;

    async fn remove_policies(&self, tuples: &[PolicyTuple]) -> StoreResult<usize>;

    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct Tuples {
    groupings: Vec<GroupingTuple>,
    policies: Vec<PolicyTuple>,
}

/// In-memory policy store for tests/dev. Each batch runs under one write lock.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    inner: RwLock<Tuples>,
    unavailable: AtomicBool,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory policy store switched off".into()));
        }
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&Tuples) -> R) -> StoreResult<R> {
        self.check()?;
        let guard = self
            .inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(f(&guard))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tuples) -> R) -> StoreResult<R> {
        self.check()?;
        let mut guard = self
            .inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(f(&mut guard))
    }
}

fn insert_all<T: PartialEq + Clone>(rows: &mut Vec<T>, batch: &[T]) -> usize {
    let mut added = 0;
    for tuple in batch {
        if !rows.contains(tuple) {
            rows.push(tuple.clone());
            added += 1;
        }
    }
    added
}

fn remove_all<T: PartialEq>(rows: &mut Vec<T>, batch: &[T]) -> usize {
    let before = rows.len();
    rows.retain(|row| !batch.contains(row));
    before - rows.len()
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn roles_of(&self, member: &str, domains: &[TenantId]) -> StoreResult<Vec<RoleCode>> {
        self.read(|t| {
            t.groupings
                .iter()
                .filter(|g| g.member == member && domains.contains(&g.domain))
                .map(|g| g.role.clone())
                .collect()
        })
    }

    async fn policies_for(&self, roles: &[RoleCode], domain: &TenantId) -> StoreResult<Vec<PolicyTuple>> {
        self.read(|t| {
            t.policies
                .iter()
                .filter(|p| p.domain == *domain && roles.contains(&p.role))
                .cloned()
                .collect()
        })
    }

    async fn add_groupings(&self, tuples: &[GroupingTuple]) -> StoreResult<usize> {
        self.write(|t| insert_all(&mut t.groupings, tuples))
    }

    async fn remove_groupings(&self, tuples: &[GroupingTuple]) -> StoreResult<usize> {
        self.write(|t| remove_all(&mut t.groupings, tuples))
    }

    async fn add_policies(&self, tuples: &[PolicyTuple]) -> StoreResult<usize> {
        self.write(|t| insert_all(&mut t.policies, tuples))
    }

    async fn remove_policies(&self, tuples: &[PolicyTuple]) -> StoreResult<usize> {
        self.write(|t| remove_all(&mut t.policies, tuples))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}
