//! Bounded LRU of inflection bundles, owned by a protocol adapter. Keyed by model name so
//! interleaved requests for different models never read each other's bundle.

use super::ViewModel;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex};

pub const DEFAULT_INFLECTION_CAPACITY: usize = 32;

#[derive(Debug)]
pub struct InflectionCache {
    capacity: usize,
    /// Least recently used first.
    entries: Mutex<IndexMap<String, Arc<ViewModel>>>,
}

impl Default for InflectionCache {
    fn default() -> Self {
        InflectionCache::new(DEFAULT_INFLECTION_CAPACITY)
    }
}

impl InflectionCache {
    pub fn new(capacity: usize) -> Self {
        InflectionCache {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Cached bundle for `model_name`, computing and inserting it on a miss.
    pub fn get(&self, model_name: &str) -> Arc<ViewModel> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = entries.shift_remove(model_name) {
            entries.insert(model_name.to_string(), hit.clone());
            return hit;
        }
        let expanded = Arc::new(ViewModel::expand(model_name));
        entries.insert(model_name.to_string(), expanded.clone());
        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::debug!(model = %evicted, "inflection cache evict");
            }
        }
        expanded
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(model_name)
    }
}
