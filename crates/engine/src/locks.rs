//! Per-entity async mutexes.
//!
//! Reservation changes and checkout for one listing run strictly one after
//! another; different listings proceed in parallel. A command that touches
//! several listings locks them in ascending id order, so two such commands
//! cannot deadlock.
//!
//! Lock order across tables: listings, then the catalog lock, then
//! addresses. Nothing acquires another lock while holding an address lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

/// A table of lazily created async mutexes keyed by entity id.
#[derive(Debug)]
pub struct EntityLocks<K> {
    slots: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K> Default for EntityLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

/// Guards for a set of locked entities. Released on drop.
#[derive(Debug)]
pub struct EntityGuards<K> {
    held: Vec<(K, OwnedMutexGuard<()>)>,
}

impl<K: PartialEq> EntityGuards<K> {
    /// Whether `key` is among the locked entities.
    #[must_use]
    pub fn holds(&self, key: &K) -> bool {
        self.held.iter().any(|(k, _)| k == key)
    }
}

impl<K> EntityLocks<K>
where
    K: Copy + Eq + Hash + Ord,
{
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: K) -> Arc<tokio::sync::Mutex<()>> {
        let mut slots = self.slots.lock();
        // Drop slots nobody holds or waits on.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        slots.entry(key).or_default().clone()
    }

    /// Lock one entity.
    pub async fn lock(&self, key: K) -> EntityGuards<K> {
        self.lock_all([key]).await
    }

    /// Lock several entities in ascending order. Duplicates are locked once.
    pub async fn lock_all(&self, keys: impl IntoIterator<Item = K>) -> EntityGuards<K> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let mut held = Vec::with_capacity(keys.len());
        for key in keys {
            let guard = self.slot(key).lock_owned().await;
            held.push((key, guard));
        }
        EntityGuards { held }
    }

    /// Number of slots currently allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no slots are allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
