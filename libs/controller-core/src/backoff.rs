use std::collections::HashMap;
use std::sync::Arc;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use flotilla_model::ObjectKey;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

struct Entry {
    backoff: ExponentialBackoff,
    retry_after: Instant,
}

/// Per-object exponential backoff, so one misbehaving object's repeated
/// reconcile failures don't starve poll capacity from the rest — grounded on
/// the teacher's `Context::error_backoff_cache` (`libs/operator/src/controller/context.rs`),
/// rebuilt here without the Kubernetes `ObjectRef` key type.
#[derive(Default)]
pub struct BackoffCache {
    entries: RwLock<HashMap<ObjectKey, RwLock<Entry>>>,
}

fn new_backoff() -> ExponentialBackoff {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(5 * 60))
        .without_max_times()
        .build()
}

impl BackoffCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Advances and returns the next backoff delay for `key`, creating a fresh
    /// backoff series on first failure. Also records `retry_after` so
    /// [`Self::is_ready`] can skip the object until the delay elapses.
    pub async fn next_delay(&self, key: &ObjectKey) -> Duration {
        let delay = {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                let mut entry = entry.write().await;
                entry.backoff.next()
            } else {
                None
            }
        };

        let delay = match delay {
            Some(delay) => delay,
            None => {
                let mut backoff = new_backoff();
                let delay = backoff.next().unwrap_or(Duration::from_secs(1));
                self.entries.write().await.insert(
                    key.clone(),
                    RwLock::new(Entry {
                        backoff,
                        retry_after: Instant::now() + delay,
                    }),
                );
                return delay;
            }
        };

        if let Some(entry) = self.entries.read().await.get(key) {
            entry.write().await.retry_after = Instant::now() + delay;
        }
        delay
    }

    /// False while `key` is still serving out a prior backoff delay.
    pub async fn is_ready(&self, key: &ObjectKey) -> bool {
        match self.entries.read().await.get(key) {
            Some(entry) => Instant::now() >= entry.read().await.retry_after,
            None => true,
        }
    }

    /// Clears `key`'s backoff series after a successful reconcile, so the next
    /// failure starts from the minimum delay again.
    pub async fn reset(&self, key: &ObjectKey) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_model::Kind;

    #[tokio::test]
    async fn delay_grows_on_repeated_failure() {
        let cache = BackoffCache::new();
        let key = ObjectKey::namespaced(Kind::Pod, "default", "web-0");
        let first = cache.next_delay(&key).await;
        let second = cache.next_delay(&key).await;
        assert!(second >= first);
    }

    #[tokio::test]
    async fn reset_restarts_the_series() {
        let cache = BackoffCache::new();
        let key = ObjectKey::namespaced(Kind::Pod, "default", "web-0");
        cache.next_delay(&key).await;
        cache.next_delay(&key).await;
        cache.reset(&key).await;
        let after_reset = cache.next_delay(&key).await;
        let first_ever = {
            let fresh = BackoffCache::new();
            fresh.next_delay(&key).await
        };
        assert_eq!(after_reset, first_ever);
    }
}
