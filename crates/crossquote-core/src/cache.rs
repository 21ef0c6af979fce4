//! Optional TTL cache consulted by HTTP collectors before going upstream.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{Market, ProviderId, Symbol};

/// Cache key: one provider's snapshot of one identifier in one market.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: ProviderId,
    pub market: Market,
    pub symbol: Symbol,
}

impl CacheKey {
    pub fn new(provider: ProviderId, market: Market, symbol: Symbol) -> Self {
        Self {
            provider,
            market,
            symbol,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.market, self.symbol)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<CacheKey, CacheEntry>,
    default_ttl: Duration,
}

impl CacheInner {
    fn get(&self, key: &CacheKey) -> Option<String> {
        self.map
            .get(key)
            .filter(|entry| Instant::now() <= entry.expires_at)
            .map(|entry| entry.body.clone())
    }

    fn clear_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
    }
}

/// Thread-safe in-memory snapshot cache. Clones share the same store.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
                default_ttl,
            })),
        }
    }

    /// Snapshots are trusted for one minute.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(60))
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns the cached body unless it is missing or expired.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.inner.read().await.get(key)
    }

    /// Stores `body` for the default TTL or `ttl_override`. No-op when disabled.
    ///
    /// Expired entries are evicted on every write.
    pub async fn put(&self, key: CacheKey, body: String, ttl_override: Option<Duration>) {
        let mut store = self.inner.write().await;
        if store.default_ttl.is_zero() {
            return;
        }

        store.clear_expired();
        let ttl = ttl_override.unwrap_or(store.default_ttl);
        store.map.insert(
            key,
            CacheEntry {
                body,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub async fn clear(&self) {
        self.inner.write().await.map.clear();
    }

    /// Entry count, expired entries included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }
}
