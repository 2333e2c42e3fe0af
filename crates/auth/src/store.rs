//! Credential store contract: refresh entries, blacklist markers and the
//! per-user session index, each with its own TTL.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use tenantgate_core::{Classify, ErrorKind, TenantId, TokenId, UserId};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a backing store (credential or policy).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store returned corrupt data: {0}")]
    Corrupt(String),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Infrastructure
    }
}

/// Result of an atomic compare-and-delete on a refresh entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RefreshTake {
    /// The stored value matched and has been deleted.
    Consumed,
    /// An entry exists but holds a different value; it is left untouched.
    Mismatch,
    /// No live entry for the token id.
    Missing,
}

/// Owner of a session-index set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl SessionKey {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }
}

/// Fixed, disjoint key prefixes so the three record kinds can never collide.
pub struct KeySpace;

impl KeySpace {
    pub const REFRESH_PREFIX: &'static str = "refresh_token:";
    pub const BLACKLIST_PREFIX: &'static str = "token_blacklist:";
    pub const SESSION_PREFIX: &'static str = "user_tokens:";

    pub fn refresh(token_id: &TokenId) -> String {
        format!("{}{}", Self::REFRESH_PREFIX, token_id)
    }

    pub fn blacklist(token_id: &TokenId) -> String {
        format!("{}{}", Self::BLACKLIST_PREFIX, token_id)
    }

    /// `user_tokens:{tenant length}:{tenant}:{user}`. Ids may contain `:`,
    /// so the tenant is length-prefixed to keep every owner on its own key.
    pub fn sessions(key: &SessionKey) -> String {
        let tenant = key.tenant_id.as_str();
        format!("{}{}:{}:{}", Self::SESSION_PREFIX, tenant.len(), tenant, key.user_id)
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn put_refresh(&self, token_id: &TokenId, refresh_token: &str, ttl: Duration) -> StoreResult<()>;

    async fn get_refresh(&self, token_id: &TokenId) -> StoreResult<Option<String>>;

    /// Delete the refresh entry iff it currently equals `expected`, atomically.
    async fn take_refresh(&self, token_id: &TokenId, expected: &str) -> StoreResult<RefreshTake>;

    async fn delete_refresh(&self, token_id: &TokenId) -> StoreResult<()>;

    /// Idempotent: a live marker keeps its original TTL.
    async fn blacklist(&self, token_id: &TokenId, ttl: Duration) -> StoreResult<()>;

    async fn is_blacklisted(&self, token_id: &TokenId) -> StoreResult<bool>;

    /// Add to the owner's set and refresh the set TTL.
    async fn add_session(&self, key: &SessionKey, token_id: &TokenId, ttl: Duration) -> StoreResult<()>;

    async fn remove_session(&self, key: &SessionKey, token_id: &TokenId) -> StoreResult<()>;

    async fn sessions(&self, key: &SessionKey) -> StoreResult<Vec<TokenId>>;

    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct Entries {
    refresh: HashMap<TokenId, Expiring<String>>,
    blacklist: HashMap<TokenId, Expiring<()>>,
    sessions: HashMap<SessionKey, Expiring<HashSet<TokenId>>>,
}

impl Entries {
    /// Drop everything past its TTL, the way Redis expiry would.
    fn prune(&mut self, now: Instant) {
        self.refresh.retain(|_, entry| entry.is_live(now));
        self.blacklist.retain(|_, entry| entry.is_live(now));
        self.sessions.retain(|_, slot| slot.is_live(now));
    }
}

/// In-memory credential store for tests/dev.
///
/// Every operation completes under a single short lock (never across an
/// await), which gives the same per-call atomicity as the Redis backend.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: Mutex<Entries>,
    unavailable: AtomicBool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut Entries, Instant) -> R) -> StoreResult<R> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        let mut entries = self
            .inner
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))?;
        Ok(f(&mut entries, Instant::now()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn put_refresh(&self, token_id: &TokenId, refresh_token: &str, ttl: Duration) -> StoreResult<()> {
        self.with_entries(|e, now| {
            e.prune(now);
            e.refresh
                .insert(*token_id, Expiring::new(refresh_token.to_string(), ttl));
        })
    }

    async fn get_refresh(&self, token_id: &TokenId) -> StoreResult<Option<String>> {
        self.with_entries(|e, now| {
            e.refresh
                .get(token_id)
                .filter(|entry| entry.is_live(now))
                .map(|entry| entry.value.clone())
        })
    }

    async fn take_refresh(&self, token_id: &TokenId, expected: &str) -> StoreResult<RefreshTake> {
        self.with_entries(|e, now| {
            let state = e
                .refresh
                .get(token_id)
                .map(|entry| (entry.is_live(now), entry.value == expected));
            match state {
                Some((true, true)) => {
                    e.refresh.remove(token_id);
                    RefreshTake::Consumed
                }
                Some((true, false)) => RefreshTake::Mismatch,
                Some((false, _)) => {
                    e.refresh.remove(token_id);
                    RefreshTake::Missing
                }
                None => RefreshTake::Missing,
            }
        })
    }

    async fn delete_refresh(&self, token_id: &TokenId) -> StoreResult<()> {
        self.with_entries(|e, _| {
            e.refresh.remove(token_id);
        })
    }

    async fn blacklist(&self, token_id: &TokenId, ttl: Duration) -> StoreResult<()> {
        self.with_entries(|e, now| {
            e.prune(now);
            if !e.blacklist.contains_key(token_id) {
                e.blacklist.insert(*token_id, Expiring::new((), ttl));
            }
        })
    }

    async fn is_blacklisted(&self, token_id: &TokenId) -> StoreResult<bool> {
        self.with_entries(|e, now| {
            e.blacklist
                .get(token_id)
                .is_some_and(|entry| entry.is_live(now))
        })
    }

    async fn add_session(&self, key: &SessionKey, token_id: &TokenId, ttl: Duration) -> StoreResult<()> {
        self.with_entries(|e, now| {
            e.prune(now);
            let slot = e
                .sessions
                .entry(key.clone())
                .or_insert_with(|| Expiring::new(HashSet::new(), ttl));
            slot.value.insert(*token_id);
            slot.expires_at = now + ttl;
        })
    }

    async fn remove_session(&self, key: &SessionKey, token_id: &TokenId) -> StoreResult<()> {
        self.with_entries(|e, _| {
            if let Some(slot) = e.sessions.get_mut(key) {
                slot.value.remove(token_id);
                if slot.value.is_empty() {
                    e.sessions.remove(key);
                }
            }
        })
    }

    async fn sessions(&self, key: &SessionKey) -> StoreResult<Vec<TokenId>> {
        self.with_entries(|e, now| {
            e.sessions
                .get(key)
                .filter(|slot| slot.is_live(now))
                .map(|slot| slot.value.iter().copied().collect())
                .unwrap_or_default()
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.with_entries(|_, _| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> SessionKey {
        SessionKey::new(TenantId::from("acme"), UserId::from("u1"))
    }

    #[test]
    fn key_prefixes_are_disjoint() {
        let id = TokenId::generate();
        let keys = [
            KeySpace::refresh(&id),
            KeySpace::blacklist(&id),
            KeySpace::sessions(&owner()),
        ];
        assert!(keys[0].starts_with("refresh_token:"));
        assert!(keys[1].starts_with("token_blacklist:"));
        assert_eq!(keys[2], "user_tokens:4:acme:u1");
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn session_keys_stay_distinct_when_ids_contain_colons() {
        let left = SessionKey::new(TenantId::from("a:b"), UserId::from("c"));
        let right = SessionKey::new(TenantId::from("a"), UserId::from("b:c"));
        assert_ne!(KeySpace::sessions(&left), KeySpace::sessions(&right));
    }

    #[tokio::test]
    async fn take_refresh_is_compare_and_delete() {
        let store = InMemoryCredentialStore::new();
        let id = TokenId::generate();
        store.put_refresh(&id, "r1", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.take_refresh(&id, "other").await.unwrap(), RefreshTake::Mismatch);
        assert_eq!(store.get_refresh(&id).await.unwrap().as_deref(), Some("r1"));

        assert_eq!(store.take_refresh(&id, "r1").await.unwrap(), RefreshTake::Consumed);
        assert_eq!(store.take_refresh(&id, "r1").await.unwrap(), RefreshTake::Missing);
        assert!(store.get_refresh(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let store = InMemoryCredentialStore::new();
        let id = TokenId::generate();
        store.blacklist(&id, Duration::from_millis(20)).await.unwrap();
        store.put_refresh(&id, "r1", Duration::from_millis(20)).await.unwrap();
        assert!(store.is_blacklisted(&id).await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!store.is_blacklisted(&id).await.unwrap());
        assert!(store.get_refresh(&id).await.unwrap().is_none());
        assert_eq!(store.take_refresh(&id, "r1").await.unwrap(), RefreshTake::Missing);
    }

    #[tokio::test]
    async fn expired_entries_are_purged_on_write() {
        let store = InMemoryCredentialStore::new();
        let short = Duration::from_millis(20);
        for _ in 0..5 {
            let id = TokenId::generate();
            store.put_refresh(&id, "r", short).await.unwrap();
            store.blacklist(&id, short).await.unwrap();
            store.add_session(&owner(), &id, short).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(40)).await;
        store
            .blacklist(&TokenId::generate(), Duration::from_secs(60))
            .await
            .unwrap();

        let entries = store.inner.lock().unwrap();
        assert!(entries.refresh.is_empty());
        assert_eq!(entries.blacklist.len(), 1);
        assert!(entries.sessions.is_empty());
    }

    #[tokio::test]
    async fn session_index_add_remove() {
        let store = InMemoryCredentialStore::new();
        let (a, b) = (TokenId::generate(), TokenId::generate());
        let ttl = Duration::from_secs(60);
        store.add_session(&owner(), &a, ttl).await.unwrap();
        store.add_session(&owner(), &b, ttl).await.unwrap();
        store.add_session(&owner(), &b, ttl).await.unwrap();

        let mut ids = store.sessions(&owner()).await.unwrap();
        ids.sort_by_key(|id| id.to_string());
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.to_string());
        assert_eq!(ids, expected);

        store.remove_session(&owner(), &a).await.unwrap();
        assert_eq!(store.sessions(&owner()).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn outage_surfaces_as_infrastructure_error() {
        let store = InMemoryCredentialStore::new();
        store.set_unavailable(true);
        let err = store.is_blacklisted(&TokenId::generate()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(store.ping().await.is_err());
    }
}
