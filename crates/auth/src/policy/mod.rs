//! Tenant-scoped RBAC with domains.
//!
//! Subjects reach roles through grouping tuples, roles inherit from roles,
//! and a request is allowed iff some policy tuple of a reachable role matches
//! the request's domain, resource and action. Default effect is deny.

mod enforcer;
mod matcher;
mod model;
mod store;

pub use enforcer::{DEFAULT_MAX_DEPTH, Enforcer, PolicyError};
pub use matcher::{action_matches, resource_matches};
pub use model::{Decision, GroupingTuple, PolicyTuple};
pub use store::{InMemoryPolicyStore, PolicyStore};
