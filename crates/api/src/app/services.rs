//! Service wiring: the composition root for stores, token manager and enforcer.

use std::sync::Arc;

use tenantgate_auth::{
    CredentialStore, Enforcer, InMemoryCredentialStore, InMemoryPolicyStore, PolicyStore, TokenConfig,
    TokenManager,
};
use tenantgate_infra::{AppConfig, PgPolicyStore};

/// Shared, explicitly constructed services handed to every handler.
pub struct AppServices {
    pub tokens: TokenManager,
    pub enforcer: Enforcer,
}

impl AppServices {
    pub fn new(tokens: TokenManager, enforcer: Enforcer) -> Self {
        Self { tokens, enforcer }
    }

    /// Wire both subsystems to the given stores.
    pub fn with_stores(
        config: TokenConfig,
        credentials: Arc<dyn CredentialStore>,
        policies: Arc<dyn PolicyStore>,
    ) -> Self {
        let enforcer = Enforcer::new(policies, config.store_timeout);
        let tokens = TokenManager::new(config, credentials);
        Self::new(tokens, enforcer)
    }

    /// In-memory stores only (dev/test).
    pub fn in_memory(config: TokenConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemoryPolicyStore::new()),
        )
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let credentials = credential_store(config).await?;

    let policies: Arc<dyn PolicyStore> = match &config.database_url {
        Some(url) => {
            let store = PgPolicyStore::connect(url).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory policy store");
            Arc::new(InMemoryPolicyStore::new())
        }
    };

    let services = AppServices::with_stores(config.tokens.clone(), credentials, policies);

    if let Some(admin) = &config.bootstrap_admin {
        services.enforcer.grant_super_admin(admin).await?;
        tracing::info!(target: "audit", user_id = %admin, "bootstrap super admin granted");
    }

    Ok(services)
}

#[cfg(feature = "redis")]
async fn credential_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    match &config.redis_url {
        Some(url) => Ok(Arc::new(tenantgate_infra::RedisCredentialStore::connect(url).await?)),
        None => {
            tracing::warn!("REDIS_URL not set; using in-memory credential store");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn credential_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but redis feature not enabled, falling back to in-memory");
    }
    Ok(Arc::new(InMemoryCredentialStore::new()))
}
