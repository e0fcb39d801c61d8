use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{error::DbError, utils::HandyRwLock};

/// Shared, lock-protected value.
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, DbError>;

/// A `HashMap` behind an `RwLock`, with the handful of combined operations
/// the buffer pool needs to stay consistent under concurrent access.
pub struct ConcurrentHashMap<K, V> {
    map: RwLock<HashMap<K, V>>,
}

impl<K, V> ConcurrentHashMap<K, V>
where
    K: std::cmp::Eq + std::hash::Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.map.rl().get(key).cloned()
    }

    /// Return the value for `key`, creating it with `value_gen_fn` if it is
    /// not present. The generation runs under the write lock, so concurrent
    /// callers observe a single value.
    pub fn get_or_insert(
        &self,
        key: &K,
        value_gen_fn: impl FnOnce(&K) -> Result<V, DbError>,
    ) -> Result<V, DbError> {
        let mut map = self.map.wl();
        match map.get(key) {
            Some(v) => Ok(v.clone()),
            None => {
                let v = value_gen_fn(key)?;
                map.insert(key.clone(), v.clone());
                Ok(v)
            }
        }
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.map.wl().insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.map.wl().remove(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.map.rl().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.map.wl().clear();
    }
}

impl<K, V> Default for ConcurrentHashMap<K, V>
where
    K: std::cmp::Eq + std::hash::Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
