//! Keyed async mutexes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A lazily populated table of per-key async mutexes. Entries nobody holds
/// are pruned on the next acquisition.
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Hash + Eq + Ord + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.retain(|existing, slot| existing == key || Arc::strong_count(slot) > 1);
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }

    /// Locks every key in ascending order, skipping duplicates.
    pub async fn lock_all(&self, keys: &[K]) -> Vec<OwnedMutexGuard<()>> {
        let mut ordered: Vec<K> = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in &ordered {
            guards.push(self.lock(key).await);
        }
        guards
    }

    pub fn len(&self) -> usize {
        match self.slots.lock() {
            Ok(slots) => slots.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
