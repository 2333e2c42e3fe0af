//! Redis-backed credential store.
//!
//! Key layout follows [`KeySpace`]. Compare-and-delete of refresh entries
//! runs as a Lua script so two concurrent refreshes can never both consume
//! the same entry.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};

use tenantgate_auth::store::StoreResult;
use tenantgate_auth::{CredentialStore, KeySpace, RefreshTake, SessionKey, StoreError};
use tenantgate_core::TokenId;

/// 1 = consumed, 0 = missing, -1 = present with a different value.
const TAKE_REFRESH_LUA: &str = r#"
local stored = redis.call('GET', KEYS[1])
if not stored then
    return 0
end
if stored == ARGV[1] then
    redis.call('DEL', KEYS[1])
    return 1
end
return -1
"#;

#[derive(Clone)]
pub struct RedisCredentialStore {
    manager: ConnectionManager,
    take_refresh: Script,
}

impl RedisCredentialStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        tracing::info!("connecting to redis");
        let client = Client::open(url).map_err(unavailable)?;
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!(error = %e, "failed to get redis connection manager");
            unavailable(e)
        })?;

        Ok(Self {
            manager,
            take_refresh: Script::new(TAKE_REFRESH_LUA),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn unavailable(e: RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Redis expiries are whole seconds; never let a sub-second TTL become 0.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn parse_members(members: Vec<String>) -> StoreResult<Vec<TokenId>> {
    members
        .into_iter()
        .map(|m| {
            m.parse::<TokenId>()
                .map_err(|e| StoreError::Corrupt(format!("session index member '{m}': {e}")))
        })
        .collect()
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn put_refresh(&self, token_id: &TokenId, refresh_token: &str, ttl: Duration) -> StoreResult<()> {
        redis::cmd("SET")
            .arg(KeySpace::refresh(token_id))
            .arg(refresh_token)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(unavailable)
    }

    async fn get_refresh(&self, token_id: &TokenId) -> StoreResult<Option<String>> {
        redis::cmd("GET")
            .arg(KeySpace::refresh(token_id))
            .query_async(&mut self.conn())
            .await
            .map_err(unavailable)
    }

    async fn take_refresh(&self, token_id: &TokenId, expected: &str) -> StoreResult<RefreshTake> {
        let outcome: i64 = self
            .take_refresh
            .key(KeySpace::refresh(token_id))
            .arg(expected)
            .invoke_async(&mut self.conn())
            .await
            .map_err(unavailable)?;

        match outcome {
            1 => Ok(RefreshTake::Consumed),
            0 => Ok(RefreshTake::Missing),
            -1 => Ok(RefreshTake::Mismatch),
            other => Err(StoreError::Corrupt(format!("unexpected take_refresh result {other}"))),
        }
    }

    async fn delete_refresh(&self, token_id: &TokenId) -> StoreResult<()> {
        redis::cmd("DEL")
            .arg(KeySpace::refresh(token_id))
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(unavailable)
    }

    async fn blacklist(&self, token_id: &TokenId, ttl: Duration) -> StoreResult<()> {
        // NX keeps the original expiry of an existing marker.
        let _: Option<String> = redis::cmd("SET")
            .arg(KeySpace::blacklist(token_id))
            .arg("revoked")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut self.conn())
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn is_blacklisted(&self, token_id: &TokenId) -> StoreResult<bool> {
        redis::cmd("EXISTS")
            .arg(KeySpace::blacklist(token_id))
            .query_async(&mut self.conn())
            .await
            .map_err(unavailable)
    }

    async fn add_session(&self, key: &SessionKey, token_id: &TokenId, ttl: Duration) -> StoreResult<()> {
        let set = KeySpace::sessions(key);
        redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(&set)
            .arg(token_id.to_string())
            .ignore()
            .cmd("EXPIRE")
            .arg(&set)
            .arg(ttl_secs(ttl))
            .ignore()
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(unavailable)
    }

    async fn remove_session(&self, key: &SessionKey, token_id: &TokenId) -> StoreResult<()> {
        redis::cmd("SREM")
            .arg(KeySpace::sessions(key))
            .arg(token_id.to_string())
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(unavailable)
    }

    async fn sessions(&self, key: &SessionKey) -> StoreResult<Vec<TokenId>> {
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(KeySpace::sessions(key))
            .query_async(&mut self.conn())
            .await
            .map_err(unavailable)?;
        parse_members(members)
    }

    async fn ping(&self) -> StoreResult<()> {
        redis::cmd("PING")
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(unavailable)
    }
}
