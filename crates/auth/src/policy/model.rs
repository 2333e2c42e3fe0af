use serde::{Deserialize, Serialize};

use tenantgate_core::{RoleCode, TenantId};

/// `(role, domain, resource pattern, action pattern)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyTuple {
    pub role: RoleCode,
    pub domain: TenantId,
    pub resource: String,
    pub action: String,
}

impl PolicyTuple {
    pub fn new(
        role: impl Into<RoleCode>,
        domain: impl Into<TenantId>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            domain: domain.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }
}

/// `(member, role, domain)`: `member` holds `role` inside `domain`.
///
/// `member` is either a user id or another role code (inheritance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupingTuple {
    pub member: String,
    pub role: RoleCode,
    pub domain: TenantId,
}

impl GroupingTuple {
    pub fn new(member: impl Into<String>, role: impl Into<RoleCode>, domain: impl Into<TenantId>) -> Self {
        Self {
            member: member.into(),
            role: role.into(),
            domain: domain.into(),
        }
    }
}

/// Outcome of one enforcement, kept for audit logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    /// Every role reachable from the subject in the request domain.
    pub roles: Vec<RoleCode>,
    /// The first policy tuple that granted access.
    pub matched: Option<PolicyTuple>,
}

impl Decision {
    pub fn deny(roles: Vec<RoleCode>) -> Self {
        Self {
            allowed: false,
            roles,
            matched: None,
        }
    }

    pub fn allow(roles: Vec<RoleCode>, matched: PolicyTuple) -> Self {
        Self {
            allowed: true,
            roles,
            matched: Some(matched),
        }
    }
}
