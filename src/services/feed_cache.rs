//! Short-lived cache for the first page of each ranked feed.
//!
//! Entries expire by TTL only; writes never invalidate them, so page one may
//! show vote counts up to one TTL old. Pages other than the first are always
//! computed fresh. A failing cache never fails the request.
//!
//! The in-memory cache is bounded: every write sweeps expired pages, and once
//! `max_entries` live pages are held the ones closest to expiry are evicted.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;

/// Which feed a page belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedScope {
    /// Every post, for anonymous visitors.
    All,
    /// Posts of one community.
    Community(String),
    /// Posts of the communities a user subscribes to.
    Subscriptions(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedKey {
    pub scope: FeedScope,
    pub page: u32,
}

impl FeedKey {
    pub fn new(scope: FeedScope, page: u32) -> Self {
        Self { scope, page }
    }

    pub fn is_cacheable(&self) -> bool {
        self.page == 1
    }
}

/// How long a cached page stays valid, and how many pages are kept at most.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl CachePolicy {
    pub const DEFAULT: Self = Self {
        ttl: Duration::from_secs(60),
        max_entries: 10_000,
    };

    pub fn from_secs(secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(secs),
            ..Self::DEFAULT
        }
    }

    pub fn with_max_entries(self, max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            ..self
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("feed cache unavailable: {0}")]
    Unavailable(String),
}

/// Storage for ranked pages. Values are replaced wholesale per key.
#[async_trait]
pub trait FeedCache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &FeedKey) -> Result<Option<Vec<V>>, CacheError>;
    async fn put(&self, key: FeedKey, page: Vec<V>) -> Result<(), CacheError>;
}

#[derive(Debug)]
struct CachedPage<V> {
    page: Vec<V>,
    expires_at: Instant,
}

impl<V> CachedPage<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local cache backed by `DashMap`.
pub struct InMemoryFeedCache<V> {
    entries: DashMap<FeedKey, CachedPage<V>>,
    policy: CachePolicy,
}

impl<V> InMemoryFeedCache<V> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl<V> FeedCache<V> for InMemoryFeedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &FeedKey) -> Result<Option<Vec<V>>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.page.clone()));
            }
        }
        // The read guard is released above; drop the stale entry if still stale.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn put(&self, key: FeedKey, page: Vec<V>) -> Result<(), CacheError> {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        if !self.entries.contains_key(&key) && self.entries.len() >= self.policy.max_entries {
            self.evict_oldest();
        }

        let expires_at = now + self.policy.ttl;
        self.entries.insert(key, CachedPage { page, expires_at });
        Ok(())
    }
}

impl<V> InMemoryFeedCache<V> {
    /// Frees room for one more page: at least a tenth of the cache, oldest first.
    fn evict_oldest(&self) {
        let overflow = self.entries.len() + 1 - self.policy.max_entries;
        let batch = (self.entries.len() / 10).max(overflow);

        let mut by_age: Vec<(Instant, FeedKey)> = self
            .entries
            .iter()
            .map(|entry| (entry.expires_at, entry.key().clone()))
            .collect();
        by_age.sort_by_key(|(expires_at, _)| *expires_at);

        for (_, key) in by_age.into_iter().take(batch) {
            self.entries.remove(&key);
        }

        tracing::warn!(
            evicted = batch,
            max_entries = self.policy.max_entries,
            "feed cache full, evicted oldest pages"
        );
    }
}

/// Returns the cached page for `key`, or computes and caches it.
///
/// Only page one is cached. Cache errors are logged and bypassed.
pub async fn get_or_compute<V, E, F, Fut>(
    cache: &dyn FeedCache<V>,
    key: FeedKey,
    compute: F,
) -> Result<Vec<V>, E>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<V>, E>>,
{
    if !key.is_cacheable() {
        return compute().await;
    }

    match cache.get(&key).await {
        Ok(Some(page)) => {
            tracing::debug!(scope = ?key.scope, "feed cache hit");
            return Ok(page);
        }
        Ok(None) => tracing::debug!(scope = ?key.scope, "feed cache miss"),
        Err(e) => tracing::warn!(scope = ?key.scope, "feed cache read failed, computing directly: {}", e),
    }

    let page = compute().await?;

    if let Err(e) = cache.put(key, page.clone()).await {
        tracing::warn!("feed cache write failed: {}", e);
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stands in for the store: an ordering that votes can change.
    struct Source {
        ordering: Mutex<Vec<&'static str>>,
        computed: AtomicUsize,
    }

    impl Source {
        fn new(ordering: Vec<&'static str>) -> Self {
            Self {
                ordering: Mutex::new(ordering),
                computed: AtomicUsize::new(0),
            }
        }

        async fn compute(&self) -> Result<Vec<&'static str>, Infallible> {
            self.computed.fetch_add(1, Ordering::SeqCst);
            Ok(self.ordering.lock().unwrap().clone())
        }

        fn set(&self, ordering: Vec<&'static str>) {
            *self.ordering.lock().unwrap() = ordering;
        }
    }

    fn golang_page(page: u32) -> FeedKey {
        FeedKey::new(FeedScope::Community("golang".into()), page)
    }

    #[tokio::test(start_paused = true)]
    async fn page_one_is_stale_until_ttl_expires() {
        let cache: InMemoryFeedCache<&str> = InMemoryFeedCache::new(CachePolicy::from_secs(60));
        let source = Source::new(vec!["a", "b"]);

        // t=0: computed and cached
        let first = get_or_compute(&cache, golang_page(1), || source.compute()).await.unwrap();
        assert_eq!(first, vec!["a", "b"]);

        // t=10: a vote reorders the feed
        tokio::time::advance(Duration::from_secs(10)).await;
        source.set(vec!["b", "a"]);

        // t=30: still the pre-vote ordering
        tokio::time::advance(Duration::from_secs(20)).await;
        let cached = get_or_compute(&cache, golang_page(1), || source.compute()).await.unwrap();
        assert_eq!(cached, vec!["a", "b"]);
        assert_eq!(source.computed.load(Ordering::SeqCst), 1);

        // t=61: expired, new ordering visible
        tokio::time::advance(Duration::from_secs(31)).await;
        let fresh = get_or_compute(&cache, golang_page(1), || source.compute()).await.unwrap();
        assert_eq!(fresh, vec!["b", "a"]);
        assert_eq!(source.computed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn later_pages_always_compute() {
        let cache: InMemoryFeedCache<&str> = InMemoryFeedCache::new(CachePolicy::DEFAULT);
        let source = Source::new(vec!["x"]);

        for _ in 0..3 {
            get_or_compute(&cache, golang_page(2), || source.compute()).await.unwrap();
        }

        assert_eq!(source.computed.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scopes_do_not_share_entries() {
        let cache: InMemoryFeedCache<&str> = InMemoryFeedCache::new(CachePolicy::DEFAULT);
        let golang = Source::new(vec!["go"]);
        let rust = Source::new(vec!["rs"]);

        get_or_compute(&cache, golang_page(1), || golang.compute()).await.unwrap();
        let page = get_or_compute(
            &cache,
            FeedKey::new(FeedScope::Community("rust".into()), 1),
            || rust.compute(),
        )
        .await
        .unwrap();

        assert_eq!(page, vec!["rs"]);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_pages_are_swept_on_write() {
        let cache: InMemoryFeedCache<&str> = InMemoryFeedCache::new(CachePolicy::from_secs(60));
        let source = Source::new(vec!["p"]);

        for n in 0..1_000 {
            let key = FeedKey::new(FeedScope::Community(format!("c{n}")), 1);
            get_or_compute(&cache, key, || source.compute()).await.unwrap();
        }
        assert_eq!(cache.len(), 1_000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        get_or_compute(&cache, FeedKey::new(FeedScope::All, 1), || source.compute())
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn live_pages_are_capped() {
        let cache: InMemoryFeedCache<&str> =
            InMemoryFeedCache::new(CachePolicy::DEFAULT.with_max_entries(3));
        let key = |user: i64| FeedKey::new(FeedScope::Subscriptions(user), 1);

        for user in 1..=5 {
            cache.put(key(user), vec!["p"]).await.unwrap();
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&key(1)).await.unwrap().is_none());
        assert!(cache.get(&key(2)).await.unwrap().is_none());
        assert_eq!(cache.get(&key(5)).await.unwrap(), Some(vec!["p"]));
    }

    #[tokio::test(start_paused = true)]
    async fn rewriting_a_key_does_not_evict() {
        let cache: InMemoryFeedCache<&str> =
            InMemoryFeedCache::new(CachePolicy::DEFAULT.with_max_entries(2));
        let all = FeedKey::new(FeedScope::All, 1);
        let golang = golang_page(1);

        cache.put(all.clone(), vec!["a"]).await.unwrap();
        cache.put(golang.clone(), vec!["g"]).await.unwrap();
        cache.put(all.clone(), vec!["a2"]).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&golang).await.unwrap(), Some(vec!["g"]));
        assert_eq!(cache.get(&all).await.unwrap(), Some(vec!["a2"]));
    }

    struct BrokenCache;

    #[async_trait]
    impl FeedCache<&'static str> for BrokenCache {
        async fn get(&self, _: &FeedKey) -> Result<Option<Vec<&'static str>>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn put(&self, _: FeedKey, _: Vec<&'static str>) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn unavailable_cache_falls_back_to_compute() {
        let source = Source::new(vec!["a"]);

        let page = get_or_compute(&BrokenCache, FeedKey::new(FeedScope::All, 1), || source.compute())
            .await
            .unwrap();

        assert_eq!(page, vec!["a"]);
        assert_eq!(source.computed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn compute_errors_propagate_and_are_not_cached() {
        let cache: InMemoryFeedCache<i32> = InMemoryFeedCache::new(CachePolicy::DEFAULT);

        let result = get_or_compute(&cache, FeedKey::new(FeedScope::All, 1), || async {
            Err::<Vec<i32>, _>("store down")
        })
        .await;

        assert_eq!(result, Err("store down"));
        assert!(cache.is_empty());
    }
}
