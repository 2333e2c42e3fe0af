//! Token lifecycle: issuance, verification, rotation and revocation.
//!
//! Composed from the stateless [`TokenCodec`] and an injected
//! [`CredentialStore`]. Nothing is cached in-process: every verification
//! re-reads the blacklist, so a revocation is effective on the next request.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use serde::Serialize;

use tenantgate_core::{Classify, RoleCode, TenantId, TokenId, UserId};

use crate::claims::{IdentityClaims, TokenKind};
use crate::clock::{Clock, SystemClock};
use crate::codec::TokenCodec;
use crate::error::AuthError;
use crate::store::{CredentialStore, RefreshTake, SessionKey, StoreError};

/// What to revoke when a refresh token fails the stored-value check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReplayPolicy {
    /// Revoke only the tokenID carried by the replayed token.
    #[default]
    RevokeToken,
    /// Revoke every active session of the user named in the replayed token.
    RevokeUserSessions,
}

impl FromStr for ReplayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" | "revoke_token" => Ok(Self::RevokeToken),
            "user" | "sessions" | "revoke_user_sessions" => Ok(Self::RevokeUserSessions),
            other => Err(format!("unknown replay policy '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub issuer: Option<String>,
    /// Grace window applied to expiry checks. Zero by default.
    pub leeway: Duration,
    /// Deadline applied to every individual store call.
    pub store_timeout: Duration,
    pub replay_policy: ReplayPolicy,
}

impl TokenConfig {
    pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(2 * 60 * 60);
    pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(access_secret: impl Into<Vec<u8>>, refresh_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: Self::DEFAULT_ACCESS_TTL,
            refresh_ttl: Self::DEFAULT_REFRESH_TTL,
            issuer: None,
            leeway: Duration::ZERO,
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
            replay_policy: ReplayPolicy::default(),
        }
    }
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .field("leeway", &self.leeway)
            .field("store_timeout", &self.store_timeout)
            .field("replay_policy", &self.replay_policy)
            .finish()
    }
}

/// Access/refresh pair handed back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_id: TokenId,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

pub struct TokenManager {
    codec: TokenCodec,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    store_timeout: Duration,
    replay_policy: ReplayPolicy,
}

impl TokenManager {
    pub fn new(config: TokenConfig, store: Arc<dyn CredentialStore>) -> Self {
        let leeway = chrono::Duration::from_std(config.leeway).unwrap_or_else(|_| chrono::Duration::zero());
        let mut codec = TokenCodec::new(&config.access_secret, &config.refresh_secret).with_leeway(leeway);
        if let Some(issuer) = config.issuer {
            codec = codec.with_issuer(issuer);
        }

        Self {
            codec,
            store,
            clock: Arc::new(SystemClock),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            store_timeout: config.store_timeout,
            replay_policy: config.replay_policy,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Run one store call under the configured deadline.
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        let err = match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => StoreError::Timeout(self.store_timeout),
        };
        tracing::error!(operation, error = %err, "credential store call failed");
        Err(AuthError::Store(err))
    }

    fn claims_for(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        role_id: &RoleCode,
        roles: Vec<RoleCode>,
        token_id: TokenId,
        now: DateTime<chrono::Utc>,
    ) -> IdentityClaims {
        let iat = now.timestamp();
        IdentityClaims {
            tenant_id: tenant_id.clone(),
            user_id: user_id.clone(),
            role_id: role_id.clone(),
            roles,
            token_id,
            iat,
            nbf: iat,
            exp: iat + self.access_ttl.as_secs() as i64,
            iss: self.codec.issuer().map(str::to_string),
        }
    }

    /// Issue a fresh pair and register it in the store.
    pub async fn issue(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        role_id: &RoleCode,
    ) -> Result<TokenPair, AuthError> {
        self.issue_with_roles(tenant_id, user_id, role_id, vec![role_id.clone()])
            .await
    }

    pub async fn issue_with_roles(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        role_id: &RoleCode,
        roles: Vec<RoleCode>,
    ) -> Result<TokenPair, AuthError> {
        let token_id = TokenId::generate();
        let access_claims = self.claims_for(tenant_id, user_id, role_id, roles, token_id, self.clock.now());
        let refresh_claims = IdentityClaims {
            exp: access_claims.iat + self.refresh_ttl.as_secs() as i64,
            ..access_claims.clone()
        };

        let access_token = self.codec.encode(TokenKind::Access, &access_claims)?;
        let refresh_token = self.codec.encode(TokenKind::Refresh, &refresh_claims)?;

        self.call(
            "put_refresh",
            self.store.put_refresh(&token_id, &refresh_token, self.refresh_ttl),
        )
        .await?;
        let owner = SessionKey::new(tenant_id.clone(), user_id.clone());
        self.call(
            "add_session",
            self.store.add_session(&owner, &token_id, self.refresh_ttl),
        )
        .await?;

        tracing::info!(
            target: "audit",
            tenant_id = %tenant_id,
            user_id = %user_id,
            token_id = %token_id,
            "session issued"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_id,
            token_type: "Bearer",
            expires_in: self.access_ttl.as_secs(),
        })
    }

    /// Signature + expiry, then one blacklist lookup. Never mutates.
    pub async fn verify_access(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let claims = self.codec.decode(TokenKind::Access, token, self.clock.now())?;

        if self
            .call("is_blacklisted", self.store.is_blacklisted(&claims.token_id))
            .await?
        {
            tracing::debug!(target: "audit", token_id = %claims.token_id, "blacklisted access token presented");
            return Err(AuthError::TokenBlacklisted);
        }

        Ok(claims)
    }

    /// Rotate a refresh token into a new pair.
    ///
    /// The stored entry is consumed by an atomic compare-and-delete, so of two
    /// concurrent calls with the same token exactly one proceeds. The old
    /// tokenID is blacklisted before the new pair exists.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .codec
            .decode(TokenKind::Refresh, refresh_token, self.clock.now())?;

        let outcome = self
            .call(
                "take_refresh",
                self.store.take_refresh(&claims.token_id, refresh_token),
            )
            .await?;
        if outcome != RefreshTake::Consumed {
            tracing::warn!(
                target: "audit",
                tenant_id = %claims.tenant_id,
                user_id = %claims.user_id,
                token_id = %claims.token_id,
                ?outcome,
                policy = ?self.replay_policy,
                "refresh token replay detected"
            );
            self.contain_replay(&claims).await?;
            return Err(AuthError::TokenReplayed);
        }

        self.call(
            "blacklist",
            self.store.blacklist(&claims.token_id, self.access_ttl),
        )
        .await?;

        let pair = self
            .issue_with_roles(&claims.tenant_id, &claims.user_id, &claims.role_id, claims.roles.clone())
            .await?;

        let owner = SessionKey::new(claims.tenant_id.clone(), claims.user_id.clone());
        self.call(
            "remove_session",
            self.store.remove_session(&owner, &claims.token_id),
        )
        .await?;

        tracing::info!(
            target: "audit",
            old_token_id = %claims.token_id,
            token_id = %pair.token_id,
            "session rotated"
        );
        Ok(pair)
    }

    async fn contain_replay(&self, claims: &IdentityClaims) -> Result<(), AuthError> {
        match self.replay_policy {
            ReplayPolicy::RevokeToken => self.revoke(&claims.token_id).await,
            ReplayPolicy::RevokeUserSessions => {
                self.revoke(&claims.token_id).await?;
                self.revoke_all_for_user(&claims.tenant_id, &claims.user_id)
                    .await
                    .map(|_| ())
            }
        }
    }

    /// Blacklist a tokenID and drop its refresh entry. Idempotent.
    pub async fn revoke(&self, token_id: &TokenId) -> Result<(), AuthError> {
        self.call("blacklist", self.store.blacklist(token_id, self.access_ttl))
            .await?;
        self.call("delete_refresh", self.store.delete_refresh(token_id))
            .await?;
        tracing::info!(target: "audit", token_id = %token_id, "session revoked");
        Ok(())
    }

    /// Revoke the caller's own session and unlink it from the session index.
    pub async fn logout(&self, claims: &IdentityClaims) -> Result<(), AuthError> {
        self.revoke(&claims.token_id).await?;
        let owner = SessionKey::new(claims.tenant_id.clone(), claims.user_id.clone());
        self.call(
            "remove_session",
            self.store.remove_session(&owner, &claims.token_id),
        )
        .await
    }

    /// Revoke every session in the user's index. Returns how many were revoked.
    pub async fn revoke_all_for_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<usize, AuthError> {
        let owner = SessionKey::new(tenant_id.clone(), user_id.clone());
        let token_ids = self.call("sessions", self.store.sessions(&owner)).await?;

        for token_id in &token_ids {
            self.revoke(token_id).await?;
            self.call("remove_session", self.store.remove_session(&owner, token_id))
                .await?;
        }

        tracing::info!(
            target: "audit",
            tenant_id = %tenant_id,
            user_id = %user_id,
            revoked = token_ids.len(),
            "all sessions revoked"
        );
        Ok(token_ids.len())
    }

    pub async fn ping(&self) -> Result<(), AuthError> {
        self.call("ping", self.store.ping()).await
    }
}

/// Log an auth failure at the level its category deserves.
pub fn log_auth_failure(err: &AuthError) {
    let kind = err.kind();
    if kind.is_expected() {
        tracing::debug!(target: "audit", code = err.code(), %kind, "authentication rejected");
    } else {
        tracing::error!(code = err.code(), %kind, error = %err, "authentication failed");
    }
}
