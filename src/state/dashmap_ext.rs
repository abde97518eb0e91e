use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;

/// Snapshot helpers for `DashMap` that never hand out shard guards.
///
/// `get()` and `iter()` return guards that hold a shard lock. Keeping one
/// alive while touching another hub table (or across an `.await`) risks
/// deadlock, so readers outside the owning manager go through these clones.
pub trait DashMapExt<K, V> {
    /// Clone the value for `key`, dropping the guard immediately.
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone;

    /// Clone every key.
    fn keys_cloned(&self) -> Vec<K>
    where
        K: Clone;
}

impl<K, V> DashMapExt<K, V> for DashMap<K, V>
where
    K: Eq + Hash,
{
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get(key).map(|r| r.value().clone())
    }

    fn keys_cloned(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.iter().map(|e| e.key().clone()).collect()
    }
}
