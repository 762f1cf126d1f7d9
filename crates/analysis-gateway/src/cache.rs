use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

type Slot<V> = Arc<Mutex<Option<CacheEntry<V>>>>;

/// Short-TTL cache for expensive aggregate queries, with a single-flight
/// discipline: concurrent misses for one key rendezvous on a per-key
/// mutex, so exactly one computation runs and every waiter observes its
/// result. Entries are replaced wholesale on refresh; compute errors
/// propagate and are never cached.
pub struct ResultCache<V> {
    slots: DashMap<String, Slot<V>>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub async fn get_or_compute<E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // Clone the slot out so the map shard is not held across awaits
        let slot = {
            let entry = self.slots.entry(key.to_string()).or_default();
            Arc::clone(entry.value())
        };

        let mut guard = slot.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.inserted_at.elapsed() < ttl {
                tracing::debug!("Cache hit for {}", key);
                return Ok(entry.value.clone());
            }
        }

        tracing::debug!("Cache miss for {}, computing", key);
        let value = compute().await?;
        *guard = Some(CacheEntry {
            value: value.clone(),
            inserted_at: Instant::now(),
        });
        Ok(value)
    }

    /// Drop the entry for a key; the next lookup recomputes
    pub fn invalidate(&self, key: &str) {
        self.slots.remove(key);
    }
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
