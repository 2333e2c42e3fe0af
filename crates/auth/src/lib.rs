//! `tenantgate-auth`: bearer-session lifecycle and tenant-scoped RBAC.
//!
//! This crate is decoupled from HTTP. Storage is reached only through the
//! [`CredentialStore`] and [`PolicyStore`] traits; in-memory implementations
//! live next to each trait for tests and local development.

pub mod claims;
pub mod clock;
pub mod codec;
pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod store;

pub use claims::{IdentityClaims, TokenKind, TokenValidationError, validate_claims};
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{TokenCodec, strip_bearer};
pub use error::AuthError;
pub use lifecycle::{ReplayPolicy, TokenConfig, TokenManager, TokenPair};
pub use policy::{
    Decision, Enforcer, GroupingTuple, InMemoryPolicyStore, PolicyError, PolicyStore, PolicyTuple,
};
pub use store::{
    CredentialStore, InMemoryCredentialStore, KeySpace, RefreshTake, SessionKey, StoreError,
};
