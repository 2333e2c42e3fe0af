use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use tenantgate_core::{Classify, ErrorKind, RoleCode, TenantId, UserId};

use super::matcher::{action_matches, resource_matches};
use super::model::{Decision, GroupingTuple, PolicyTuple};
use super::store::PolicyStore;
use crate::store::StoreError;

/// Inheritance chains longer than this are cut off.
pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for PolicyError {
    fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::Store(e) => e.kind(),
        }
    }
}

/// Evaluates requests against the policy store. Holds no policy state of its
/// own: every call re-reads, so a change is visible on the next request.
pub struct Enforcer {
    store: Arc<dyn PolicyStore>,
    timeout: Duration,
    max_depth: usize,
}

impl Enforcer {
    pub fn new(store: Arc<dyn PolicyStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, PolicyError> {
        let err = match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => StoreError::Timeout(self.timeout),
        };
        tracing::error!(operation, error = %err, "policy store call failed");
        Err(PolicyError::Store(err))
    }

    /// Every role reachable from `subject` inside `domain`.
    ///
    /// Direct bindings are read in `domain` only; role inheritance is read in
    /// `domain` and the default template domain.
    pub async fn resolve_roles(&self, subject: &str, domain: &TenantId) -> Result<Vec<RoleCode>, PolicyError> {
        let direct_domains = [domain.clone()];
        let inherit_domains = [domain.clone(), TenantId::default_domain()];

        let mut seen: HashSet<RoleCode> = HashSet::new();
        let mut ordered = Vec::new();
        let mut queue: VecDeque<(RoleCode, usize)> = VecDeque::new();

        for role in self.call("roles_of", self.store.roles_of(subject, &direct_domains)).await? {
            if seen.insert(role.clone()) {
                queue.push_back((role, 1));
            }
        }

        while let Some((role, depth)) = queue.pop_front() {
            ordered.push(role.clone());
            if depth >= self.max_depth {
                tracing::warn!(%role, %domain, depth, "role inheritance depth limit reached");
                continue;
            }
            let parents = self
                .call("roles_of", self.store.roles_of(role.as_str(), &inherit_domains))
                .await?;
            for parent in parents {
                if seen.insert(parent.clone()) {
                    queue.push_back((parent, depth + 1));
                }
            }
        }

        Ok(ordered)
    }

    /// Allow iff some policy tuple of a reachable role, written against
    /// exactly `domain`, matches `resource` and `action`.
    pub async fn enforce(
        &self,
        subject: &str,
        domain: &TenantId,
        resource: &str,
        action: &str,
    ) -> Result<Decision, PolicyError> {
        let roles = self.resolve_roles(subject, domain).await?;
        if roles.is_empty() {
            return Ok(Decision::deny(roles));
        }

        let policies = self
            .call("policies_for", self.store.policies_for(&roles, domain))
            .await?;
        let matched = policies.into_iter().find(|p| {
            p.domain == *domain && resource_matches(&p.resource, resource) && action_matches(&p.action, action)
        });

        Ok(match matched {
            Some(policy) => Decision::allow(roles, policy),
            None => Decision::deny(roles),
        })
    }

    /// Bind `roles` to `user` in `domain` as one all-or-nothing batch.
    pub async fn assign_roles(
        &self,
        user: &UserId,
        roles: &[RoleCode],
        domain: &TenantId,
    ) -> Result<usize, PolicyError> {
        let batch = bindings(user.as_str(), roles, domain);
        let added = self.call("add_groupings", self.store.add_groupings(&batch)).await?;
        tracing::info!(target: "audit", user_id = %user, %domain, ?roles, added, "roles assigned");
        Ok(added)
    }

    pub async fn revoke_roles(
        &self,
        user: &UserId,
        roles: &[RoleCode],
        domain: &TenantId,
    ) -> Result<usize, PolicyError> {
        let batch = bindings(user.as_str(), roles, domain);
        let removed = self
            .call("remove_groupings", self.store.remove_groupings(&batch))
            .await?;
        tracing::info!(target: "audit", user_id = %user, %domain, ?roles, removed, "roles revoked");
        Ok(removed)
    }

    /// Make `role` inherit every permission of `parent` inside `domain`.
    pub async fn add_inheritance(&self, role: &RoleCode, parent: &RoleCode, domain: &TenantId) -> Result<bool, PolicyError> {
        let tuple = GroupingTuple::new(role.as_str().to_string(), parent.clone(), domain.clone());
        let added = self.call("add_groupings", self.store.add_groupings(&[tuple])).await?;
        Ok(added > 0)
    }

    pub async fn add_policy(&self, policy: PolicyTuple) -> Result<bool, PolicyError> {
        let added = self.call("add_policies", self.store.add_policies(&[policy])).await?;
        Ok(added > 0)
    }

    pub async fn remove_policy(&self, policy: &PolicyTuple) -> Result<bool, PolicyError> {
        let removed = self
            .call("remove_policies", self.store.remove_policies(std::slice::from_ref(policy)))
            .await?;
        Ok(removed > 0)
    }

    /// Roles bound directly to `user` in `domain`.
    pub async fn roles_for_user(&self, user: &UserId, domain: &TenantId) -> Result<Vec<RoleCode>, PolicyError> {
        self.call("roles_of", self.store.roles_of(user.as_str(), std::slice::from_ref(domain)))
            .await
    }

    /// Bind `super_admin` in the default domain and ensure its wildcard policy.
    pub async fn grant_super_admin(&self, user: &UserId) -> Result<(), PolicyError> {
        let domain = TenantId::default_domain();
        self.call(
            "add_policies",
            self.store.add_policies(&[PolicyTuple::new(RoleCode::super_admin(), domain.clone(), "*", "*")]),
        )
        .await?;
        self.assign_roles(user, &[RoleCode::super_admin()], &domain).await?;
        Ok(())
    }

    pub async fn revoke_super_admin(&self, user: &UserId) -> Result<(), PolicyError> {
        self.revoke_roles(user, &[RoleCode::super_admin()], &TenantId::default_domain())
            .await?;
        Ok(())
    }

    /// The cross-tenant capability: `subject` belongs to the default domain
    /// and holds `super_admin` there directly. User ids are only unique per
    /// tenant, so a same-named user of any other tenant never qualifies.
    pub async fn is_platform_admin(&self, home_tenant: &TenantId, subject: &str) -> Result<bool, PolicyError> {
        if !home_tenant.is_default_domain() {
            return Ok(false);
        }
        let roles = self
            .call("roles_of", self.store.roles_of(subject, &[TenantId::default_domain()]))
            .await?;
        Ok(roles.iter().any(|r| *r == RoleCode::super_admin()))
    }

    pub async fn ping(&self) -> Result<(), PolicyError> {
        self.call("ping", self.store.ping()).await
    }
}

fn bindings(member: &str, roles: &[RoleCode], domain: &TenantId) -> Vec<GroupingTuple> {
    roles
        .iter()
        .map(|role| GroupingTuple::new(member.to_string(), role.clone(), domain.clone()))
        .collect()
}
