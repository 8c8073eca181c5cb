//! Time-windowed, retry-protected fetch cache.
//!
//! Remote weather products are slow to render server-side and flaky to
//! fetch, so every remote resource goes through [`ResourceCache`]: one
//! slot per logical key, refreshed on demand with bounded retries. A
//! failed refresh keeps serving the previous value (stale beats absent)
//! and applies a cooldown before the next attempt is allowed.
//!
//! Timestamps use [`tokio::time::Instant`] so the freshness and cooldown
//! behavior can be tested under a paused clock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

/// Errors produced by a fetch collaborator.
///
/// Parse failures are deliberately in the same enum: a page that does
/// not look like the expected product is retried and degraded exactly
/// like a network failure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (connect, timeout, non-2xx status).
    #[error("request failed: {0}")]
    Transient(String),
    /// The response arrived but did not contain the expected structure.
    #[error("malformed response: {0}")]
    Parse(String),
}

/// Per-resource refresh policy, supplied by the caller on every `get`.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    /// How long a successfully fetched value is served without refetching.
    pub fresh_for: Duration,
    /// Total fetch attempts per refresh (first try included).
    pub max_attempts: usize,
    /// Fixed delay between attempts.
    pub retry_backoff: Duration,
    /// Minimum wait after a failed refresh before the next attempt.
    /// Must be shorter than `fresh_for`, otherwise a successful refresh
    /// could be throttled by its own attempt timestamp.
    pub failure_cooldown: Duration,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    fetched_at: Option<Instant>,
    last_attempt_at: Option<Instant>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            fetched_at: None,
            last_attempt_at: None,
        }
    }
}

/// One cached value per logical resource key.
///
/// The cache is parametric over the fetch collaborator: `get` takes a
/// closure that performs HTTP retrieval plus parsing and yields the
/// value to store. Values are cloned out on every hit; binary payloads
/// should be [`bytes::Bytes`] so each caller receives an independent
/// zero-offset view of the full content rather than a shared cursor.
pub struct ResourceCache<T> {
    slots: Mutex<HashMap<String, Arc<Mutex<Slot<T>>>>>,
}

impl<T: Clone> ResourceCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key`, refreshing it if stale.
    ///
    /// Behavior per call:
    /// 1. A value fetched less than `policy.fresh_for` ago is returned
    ///    as-is, with no network activity.
    /// 2. Otherwise the fetcher runs up to `policy.max_attempts` times
    ///    with `policy.retry_backoff` between attempts.
    /// 3. On success the new value is stored and returned.
    /// 4. On exhaustion the prior value (if any) keeps being served;
    ///    either way no further attempt happens for
    ///    `policy.failure_cooldown`.
    ///
    /// Callers racing on the same key serialize on a per-key mutex, so
    /// at most one refresh is in flight per key; late arrivals observe
    /// the outcome of the refresh they waited on.
    pub async fn get<F, Fut>(&self, key: &str, policy: &FetchPolicy, fetcher: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key.to_owned()).or_default())
        };
        // Per-key mutual exclusion region: held across the whole refresh.
        let mut slot = slot.lock().await;
        let now = Instant::now();

        if let (Some(value), Some(fetched_at)) = (&slot.value, slot.fetched_at) {
            if now.duration_since(fetched_at) < policy.fresh_for {
                debug!(key, "cache hit");
                return Some(value.clone());
            }
        }

        if let Some(last_attempt) = slot.last_attempt_at {
            if now.duration_since(last_attempt) < policy.failure_cooldown {
                debug!(key, "refresh throttled, serving current state");
                return slot.value.clone();
            }
        }

        info!(key, "cache miss, refreshing");
        match Self::refresh(policy, fetcher).await {
            Ok(value) => {
                slot.value = Some(value.clone());
                slot.fetched_at = Some(Instant::now());
                slot.last_attempt_at = slot.fetched_at;
                Some(value)
            }
            Err(err) => {
                slot.last_attempt_at = Some(Instant::now());
                if slot.value.is_some() {
                    warn!(key, error = %err, "refresh failed, serving stale value");
                } else {
                    warn!(key, error = %err, "refresh failed with no prior value");
                }
                slot.value.clone()
            }
        }
    }

    async fn refresh<F, Fut>(policy: &FetchPolicy, fetcher: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let strategy =
            FixedInterval::new(policy.retry_backoff).take(policy.max_attempts.saturating_sub(1));
        Retry::spawn(strategy, fetcher).await
    }
}

impl<T: Clone> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    fn policy() -> FetchPolicy {
        FetchPolicy {
            fresh_for: Duration::from_secs(600),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(100),
            failure_cooldown: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_hit_skips_fetcher() {
        let cache = ResourceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, FetchError>("napoved".to_string())
                }
            }
        };

        let first = cache.get("napoved", &policy(), fetcher.clone()).await;
        let second = cache.get("napoved", &policy(), fetcher).await;

        assert_eq!(first.as_deref(), Some("napoved"));
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_refreshes_once_for_concurrent_callers() {
        let cache = Arc::new(ResourceCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    // Slow fetch so a second caller arrives mid-refresh.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, FetchError>(format!("izdaja {n}"))
                }
            }
        };

        cache.get("napoved", &policy(), fetcher.clone()).await;
        advance(Duration::from_secs(601)).await;

        let a = tokio::spawn({
            let cache = Arc::clone(&cache);
            let fetcher = fetcher.clone();
            async move { cache.get("napoved", &policy(), fetcher).await }
        });
        let b = tokio::spawn({
            let cache = Arc::clone(&cache);
            let fetcher = fetcher.clone();
            async move { cache.get("napoved", &policy(), fetcher).await }
        });
        let (a, b) = (a.await.expect("task"), b.await.expect("task"));

        assert_eq!(a.as_deref(), Some("izdaja 1"));
        assert_eq!(b, a);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_serves_stale_and_cools_down() {
        let cache = ResourceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok("prva izdaja".to_string())
                    } else {
                        Err(FetchError::Transient("timeout".to_string()))
                    }
                }
            }
        };

        assert_eq!(
            cache.get("napoved", &policy(), fetcher.clone()).await.as_deref(),
            Some("prva izdaja")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        advance(Duration::from_secs(601)).await;
        // Refresh fails three times, prior value is kept.
        assert_eq!(
            cache.get("napoved", &policy(), fetcher.clone()).await.as_deref(),
            Some("prva izdaja")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        // Within the cooldown: no attempt at all.
        assert_eq!(
            cache.get("napoved", &policy(), fetcher.clone()).await.as_deref(),
            Some("prva izdaja")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        advance(Duration::from_secs(61)).await;
        assert_eq!(
            cache.get("napoved", &policy(), fetcher).await.as_deref(),
            Some("prva izdaja")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn first_ever_failure_returns_absent_with_cooldown() {
        let cache: ResourceCache<String> = ResourceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<String, _>(FetchError::Transient("unreachable".to_string()))
                }
            }
        };

        assert!(cache.get("radar", &policy(), fetcher.clone()).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(cache.get("radar", &policy(), fetcher.clone()).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        advance(Duration::from_secs(61)).await;
        assert!(cache.get("radar", &policy(), fetcher).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn binary_payload_is_a_full_view_on_every_hit() {
        let cache = ResourceCache::new();
        let fetcher = || async { Ok::<_, FetchError>(Bytes::from_static(b"GIF89a\x01\x02")) };

        let first = cache.get("radar", &policy(), fetcher).await.expect("value");
        let second = cache.get("radar", &policy(), fetcher).await.expect("value");

        assert_eq!(&first[..6], b"GIF89a");
        assert_eq!(second, first);
    }
}
