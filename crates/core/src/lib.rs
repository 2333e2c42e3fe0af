//! `tenantgate-core`: trust-boundary primitives shared by every layer.
//!
//! This crate contains **pure** types (no IO): identifiers, the error
//! taxonomy, the entity contract used by persistence, and the request-scoped
//! tenant context.

pub mod entity;
pub mod error;
pub mod id;
pub mod tenant;

pub use entity::Entity;
pub use error::{Classify, ErrorKind};
pub use id::{DEFAULT_TENANT, IdError, RoleCode, SUPER_ADMIN_ROLE, TenantId, TokenId, UserId};
pub use tenant::{IsolationMode, TenantContext};
