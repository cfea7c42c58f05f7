//! Caching wrapper for public key lookups.
//!
//! [`CachedKeyLookup`] sits in front of any [`PublicKeyLookup`] (typically a
//! [`JwksKeyLookup`](crate::remote::JwksKeyLookup)) so validation does not
//! round-trip to the key source on every token.
//!
//! ```text
//! token arrives → kid from header
//!               → L1 (TTL cache)          hit → verify
//!               → inner lookup            ok  → populate L1 + fallback
//!               → transient failure?      yes → fallback tier, if present
//! ```
//!
//! The fallback tier is only consulted when the inner lookup reports a
//! timeout or an unavailable source. A definitive `NotFound` is never
//! masked by a stale entry, so removing a key at the source takes effect
//! once the L1 entry expires.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use fail::fail_point;
use moka::future::Cache;
use tokengate_keys::{KeyLookupError, PublicKey, PublicKeyLookup};

/// Default L1 TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of keys held per tier.
pub const DEFAULT_CACHE_CAPACITY: u64 = 1_024;

/// Default maximum staleness of a fallback entry (1 hour).
pub const DEFAULT_FALLBACK_TTL: Duration = Duration::from_secs(3_600);

#[derive(Clone)]
struct FallbackEntry {
    key: Arc<PublicKey>,
    inserted_at: Instant,
}

/// A [`PublicKeyLookup`] that caches another lookup's answers.
///
/// Only successful lookups are cached. Errors are returned to the caller
/// unchanged unless a fallback entry can stand in for a transient failure.
pub struct CachedKeyLookup {
    cache: Cache<String, Arc<PublicKey>>,
    fallback: Cache<String, FallbackEntry>,
    inner: Arc<dyn PublicKeyLookup>,
    /// Bumped on every invalidation. A fetch that started under an older
    /// generation returns its result without caching it.
    invalidation_gen: AtomicU64,
}

impl CachedKeyLookup {
    /// Wraps `inner` with an L1 TTL of `ttl` and default capacity and
    /// fallback staleness.
    #[must_use]
    pub fn new(inner: Arc<dyn PublicKeyLookup>, ttl: Duration) -> Self {
        Self::with_fallback_ttl(inner, ttl, DEFAULT_CACHE_CAPACITY, DEFAULT_FALLBACK_TTL)
    }

    /// Wraps `inner` with explicit capacity and fallback staleness bounds.
    #[must_use]
    pub fn with_fallback_ttl(
        inner: Arc<dyn PublicKeyLookup>,
        ttl: Duration,
        max_capacity: u64,
        fallback_ttl: Duration,
    ) -> Self {
        Self {
            cache: Cache::builder().time_to_live(ttl).max_capacity(max_capacity).build(),
            fallback: Cache::builder()
                .time_to_live(fallback_ttl)
                .max_capacity(max_capacity)
                .build(),
            inner,
            invalidation_gen: AtomicU64::new(0),
        }
    }

    /// Removes `kid` from every tier.
    ///
    /// Call this when a key is known to be withdrawn at the source; the next
    /// lookup goes to the inner lookup.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(&self, kid: &str) {
        self.invalidation_gen.fetch_add(1, Ordering::Release);
        self.cache.invalidate(kid).await;
        self.fallback.invalidate(kid).await;
        tracing::info!(
            audit.action = "invalidate_key_cache",
            audit.resource = %format_args!("kid:{kid}"),
            audit.result = "success",
            "audit_event"
        );
    }

    /// Removes every cached key from every tier.
    #[tracing::instrument(skip(self))]
    pub async fn clear_all(&self) {
        let l1_count = self.cache.entry_count();
        let fallback_count = self.fallback.entry_count();
        self.invalidation_gen.fetch_add(1, Ordering::Release);
        self.cache.invalidate_all();
        self.fallback.invalidate_all();
        tracing::info!(
            audit.action = "clear_key_cache",
            audit.resource = "all_public_keys",
            audit.result = "success",
            audit.l1_evicted = l1_count,
            audit.fallback_evicted = fallback_count,
            "audit_event"
        );
    }

    /// Returns the L1 entry count. Eventually consistent; call
    /// [`sync`](Self::sync) first when an exact number matters.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns the fallback entry count. Eventually consistent.
    #[must_use]
    pub fn fallback_entry_count(&self) -> u64 {
        self.fallback.entry_count()
    }

    /// Flushes pending cache maintenance so counts are exact.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
        self.fallback.run_pending_tasks().await;
    }

    /// Drops the L1 tier only, leaving fallback entries in place.
    #[cfg(test)]
    async fn clear_l1(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    async fn fetch(&self, kid: &str) -> Result<Arc<PublicKey>, KeyLookupError> {
        fail_point!("key-lookup-before-fetch", |_| {
            Err(KeyLookupError::unavailable("injected failure before key fetch"))
        });
        self.inner.public_key_for(kid).await
    }
}

#[async_trait]
impl PublicKeyLookup for CachedKeyLookup {
    #[tracing::instrument(skip(self))]
    async fn public_key_for(&self, kid: &str) -> Result<Arc<PublicKey>, KeyLookupError> {
        if let Some(key) = self.cache.get(kid).await {
            tracing::debug!(cache = "L1", "cache hit");
            return Ok(key);
        }
        tracing::debug!(cache = "L1", "cache miss");

        let gen_before = self.invalidation_gen.load(Ordering::Acquire);

        match self.fetch(kid).await {
            Ok(key) => {
                if self.invalidation_gen.load(Ordering::Acquire) != gen_before {
                    tracing::debug!(kid, "Discarding fetched key: invalidation occurred during fetch");
                    return Ok(key);
                }
                self.cache.insert(kid.to_owned(), Arc::clone(&key)).await;
                self.fallback
                    .insert(
                        kid.to_owned(),
                        FallbackEntry { key: Arc::clone(&key), inserted_at: Instant::now() },
                    )
                    .await;
                Ok(key)
            },
            Err(err) => {
                if err.is_transient()
                    && let Some(entry) = self.fallback.get(kid).await
                {
                    tracing::warn!(
                        cache = "fallback",
                        fallback_age_secs = entry.inserted_at.elapsed().as_secs(),
                        error = %err,
                        "cache hit (fallback), key source unavailable"
                    );
                    return Ok(entry.key);
                }
                Err(err)
            },
        }
    }
}

impl fmt::Debug for CachedKeyLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKeyLookup")
            .field("entry_count", &self.cache.entry_count())
            .field("fallback_entry_count", &self.fallback.entry_count())
            .finish_non_exhaustive()
    }
}
