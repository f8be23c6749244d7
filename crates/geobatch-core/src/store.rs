//! Response cache and no-match set.

use std::collections::{HashMap, HashSet};

use crate::types::GeocodeResponse;

/// Last response per id, plus the ids the service could not match.
///
/// Both are only written while caching is enabled. Nothing is evicted;
/// long-running callers should call [`clear`](Self::clear) periodically.
#[derive(Debug)]
pub struct ResponseStore {
    cache: HashMap<String, GeocodeResponse>,
    missed: HashSet<String>,
    enabled: bool,
}

impl Default for ResponseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseStore {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            missed: HashSet::new(),
            enabled: true,
        }
    }

    /// Turn recording on or off. Existing entries are kept either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cache `response` under `id`, replacing any earlier one.
    pub fn record_match(&mut self, id: &str, response: GeocodeResponse) {
        if self.enabled {
            self.cache.insert(id.to_string(), response);
        }
    }

    pub fn record_miss(&mut self, id: &str) {
        if self.enabled {
            self.missed.insert(id.to_string());
        }
    }

    pub fn get(&self, id: &str) -> Option<&GeocodeResponse> {
        self.cache.get(id)
    }

    pub fn is_missed(&self, id: &str) -> bool {
        self.missed.contains(id)
    }

    /// Drop cached responses. The missed set is left alone.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn missed_len(&self) -> usize {
        self.missed.len()
    }
}
