use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Time-bounded key/value store shared by every poller.
///
/// The TTL belongs to the call site, not to the entry: `get` is told how old
/// a value may be. Expiry is lazy (checked on read, never swept), so memory
/// is bounded by the number of distinct keys. Failed fetches are never
/// stored, so the next read after a failure goes straight to the source.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    entries: Arc<DashMap<K, Entry<V>>>,
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /* ───────────── public API ───────────── */

    /// Returns the value for `key` if it was stored less than `ttl` ago.
    pub fn get(&self, key: &K, ttl: Duration) -> Option<V> {
        let entry = self.entries.get(key)?;
        (entry.stored_at.elapsed() < ttl).then(|| entry.value.clone())
    }

    /// Overwrites `key` and restarts its freshness clock.
    pub fn set(&self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    #[cfg(test)]
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Number of keys held, fresh or stale.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
