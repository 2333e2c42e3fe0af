//! Infrastructure layer: persistence adapters, tenant isolation, config.

pub mod config;
pub mod isolation;
pub mod policy_store;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod repository;

pub use config::{AppConfig, ConfigError};
pub use isolation::{IsolationError, Operation, TenantFilter, TenantIsolation};
pub use policy_store::PgPolicyStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisCredentialStore;
pub use repository::{InMemoryRepository, RepositoryError, Scope, ScopedQuery, TenantRepository};
