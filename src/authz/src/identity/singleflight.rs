//! Request coalescing for concurrent cold-cache resolutions of one key

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use tokio::sync::broadcast;

/// Result of trying to acquire a slot for a key
pub(crate) enum Slot<'a, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// First caller: performs the load and publishes the result
    Leader(LeaderGuard<'a, K, V>),
    /// Another caller is loading; wait for its result
    Follower(broadcast::Receiver<Option<V>>),
}

/// In-flight loads keyed by cache key
///
/// `None` is broadcast when the leader's load failed; a receiver that sees
/// `None` or a closed channel performs its own load.
pub(crate) struct Singleflight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    in_flight: DashMap<K, broadcast::Sender<Option<V>>>,
}

impl<K, V> Singleflight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Atomically become the leader for `key` or subscribe to the current one
    pub(crate) fn acquire(&self, key: K) -> Slot<'_, K, V> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => Slot::Follower(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                Slot::Leader(LeaderGuard {
                    singleflight: self,
                    key,
                    sender: tx,
                    completed: false,
                })
            }
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn remove(&self, key: &K) {
        self.in_flight.remove(key);
    }
}

/// RAII guard held by the leader
///
/// Dropping it without [`LeaderGuard::finish`] (cancellation, panic) still
/// unregisters the key; waiting followers then see a closed channel.
pub(crate) struct LeaderGuard<'a, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    singleflight: &'a Singleflight<K, V>,
    key: K,
    sender: broadcast::Sender<Option<V>>,
    completed: bool,
}

impl<K, V> LeaderGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Unregister the key, then publish the result to current followers
    pub(crate) fn finish(mut self, value: Option<V>) {
        self.singleflight.remove(&self.key);
        self.completed = true;
        // No receivers is fine
        let _ = self.sender.send(value);
    }
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if !self.completed {
            self.singleflight.remove(&self.key);
        }
    }
}
