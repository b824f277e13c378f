use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::debug;

use super::model::MappingEntry;

/// Counters exposed for observability. Hits and misses survive
/// invalidation; only [`ResolutionCache::reset_stats`] zeroes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub forward_count: usize,
    pub reverse_count: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Memoized `(type, name) -> V` table grouped by type, so a whole type can be
/// dropped at once. `order` tracks insertion order for eviction.
#[derive(Debug)]
struct Memo<V> {
    entries: HashMap<String, HashMap<String, V>>,
    order: VecDeque<(String, String)>,
    len: usize,
}

impl<V> Default for Memo<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            len: 0,
        }
    }
}

impl<V> Memo<V> {
    fn get(&self, type_name: &str, name: &str) -> Option<&V> {
        self.entries.get(type_name)?.get(name)
    }

    fn insert(&mut self, type_name: &str, name: &str, value: V) {
        let slot = self.entries.entry(type_name.to_string()).or_default();
        if slot.insert(name.to_string(), value).is_none() {
            self.order.push_back((type_name.to_string(), name.to_string()));
            self.len += 1;
        }
    }

    fn remove(&mut self, type_name: &str, name: &str) -> bool {
        let Some(slot) = self.entries.get_mut(type_name) else {
            return false;
        };
        if slot.remove(name).is_none() {
            return false;
        }
        if slot.is_empty() {
            self.entries.remove(type_name);
        }
        self.order.retain(|(t, n)| !(t == type_name && n == name));
        self.len -= 1;
        true
    }

    fn remove_type(&mut self, type_name: &str) -> usize {
        let removed = self.entries.remove(type_name).map_or(0, |slot| slot.len());
        if removed > 0 {
            self.order.retain(|(t, _)| t != type_name);
            self.len -= removed;
        }
        removed
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.len = 0;
    }

    /// Drop the `count` oldest entries by insertion order.
    fn evict_oldest(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            let Some((type_name, name)) = self.order.pop_front() else {
                break;
            };
            if let Some(slot) = self.entries.get_mut(&type_name) {
                if slot.remove(&name).is_some() {
                    self.len -= 1;
                    evicted += 1;
                }
                if slot.is_empty() {
                    self.entries.remove(&type_name);
                }
            }
        }
        evicted
    }
}

/// Forward `(type, property) -> MappingEntry` and reverse
/// `(type, json_key) -> property` memo tables.
///
/// Advisory only: every answer it gives must equal what the rule tables
/// would produce, so callers invalidate before a mutation returns. When a
/// capacity is set and a table outgrows it, the oldest half of that table
/// by insertion order is dropped. This is FIFO, not LRU: lookups do not
/// refresh an entry's position.
#[derive(Debug)]
pub struct ResolutionCache {
    forward: Memo<MappingEntry>,
    reverse: Memo<String>,
    hits: u64,
    misses: u64,
    enabled: bool,
    capacity: Option<usize>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ResolutionCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            forward: Memo::default(),
            reverse: Memo::default(),
            hits: 0,
            misses: 0,
            enabled: true,
            capacity: capacity.map(|c| c.max(1)),
        }
    }

    pub fn get(&mut self, type_name: &str, property: &str) -> Option<MappingEntry> {
        if !self.enabled {
            return None;
        }
        match self.forward.get(type_name, property) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, type_name: &str, property: &str, entry: MappingEntry) {
        if !self.enabled {
            return;
        }
        self.forward.insert(type_name, property, entry);
        if let Some(cap) = self.capacity {
            if self.forward.len > cap {
                let evicted = self.forward.evict_oldest(self.forward.len / 2);
                debug!(evicted, "Forward resolution cache over capacity");
            }
        }
    }

    pub fn get_reverse(&mut self, type_name: &str, json_key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        match self.reverse.get(type_name, json_key) {
            Some(property) => {
                self.hits += 1;
                Some(property.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put_reverse(&mut self, type_name: &str, json_key: &str, property: String) {
        if !self.enabled {
            return;
        }
        self.reverse.insert(type_name, json_key, property);
        if let Some(cap) = self.capacity {
            if self.reverse.len > cap {
                let evicted = self.reverse.evict_oldest(self.reverse.len / 2);
                debug!(evicted, "Reverse resolution cache over capacity");
            }
        }
    }

    /// Drop every forward and reverse entry for one type.
    pub fn invalidate(&mut self, type_name: &str) {
        let forward = self.forward.remove_type(type_name);
        let reverse = self.reverse.remove_type(type_name);
        if forward + reverse > 0 {
            debug!(type_name, forward, reverse, "Invalidated cached resolutions");
        }
    }

    /// Drop one property's forward entry and every reverse entry that
    /// answers with that property.
    pub fn invalidate_entry(&mut self, type_name: &str, property: &str) {
        self.forward.remove(type_name, property);
        let stale: Vec<String> = self
            .reverse
            .entries
            .get(type_name)
            .map(|slot| {
                slot.iter()
                    .filter(|(_, p)| p.as_str() == property)
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        for key in stale {
            self.reverse.remove(type_name, &key);
        }
    }

    pub fn invalidate_all(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        debug!("Invalidated all cached resolutions");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            forward_count: self.forward.len,
            reverse_count: self.reverse.len,
        }
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    /// Disabling also empties the cache, so re-enabling never serves
    /// entries from before the switch.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.forward.clear();
            self.reverse.clear();
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::model::PriorityTier;

    fn entry(key: &str) -> MappingEntry {
        MappingEntry::new(key, PriorityTier::TypeLevel, "test")
    }

    #[test]
    fn test_hit_and_miss_counting() {
        let mut cache = ResolutionCache::default();
        assert!(cache.get("User", "id").is_none());
        cache.put("User", "id", entry("user_id"));
        assert_eq!(cache.get("User", "id").unwrap().json_key, "user_id");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.forward_count, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalidate_only_touches_one_type() {
        let mut cache = ResolutionCache::default();
        cache.put("User", "id", entry("user_id"));
        cache.put_reverse("User", "user_id", "id".into());
        cache.put("Order", "id", entry("order_id"));

        cache.invalidate("User");
        assert!(cache.get("User", "id").is_none());
        assert!(cache.get_reverse("User", "user_id").is_none());
        assert!(cache.get("Order", "id").is_some());
        assert_eq!(cache.stats().forward_count, 1);
        assert_eq!(cache.stats().reverse_count, 0);
    }

    #[test]
    fn test_invalidate_entry() {
        let mut cache = ResolutionCache::default();
        cache.put("User", "id", entry("user_id"));
        cache.put("User", "name", entry("user_name"));
        cache.put_reverse("User", "user_id", "id".into());

        cache.invalidate_entry("User", "id");
        assert!(cache.get("User", "id").is_none());
        assert!(cache.get_reverse("User", "user_id").is_none());
        assert!(cache.get("User", "name").is_some());
    }

    #[test]
    fn test_invalidate_all_keeps_counters() {
        let mut cache = ResolutionCache::default();
        cache.put("User", "id", entry("user_id"));
        cache.get("User", "id");
        cache.invalidate_all();

        let stats = cache.stats();
        assert_eq!(stats.forward_count, 0);
        assert_eq!(stats.hits, 1);

        cache.reset_stats();
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_capacity_evicts_oldest_half() {
        let mut cache = ResolutionCache::new(Some(4));
        for i in 0..5 {
            cache.put("T", &format!("p{i}"), entry(&format!("k{i}")));
        }
        // 5 > 4, so the two oldest are dropped.
        assert_eq!(cache.stats().forward_count, 3);
        assert!(cache.get("T", "p0").is_none());
        assert!(cache.get("T", "p1").is_none());
        assert!(cache.get("T", "p4").is_some());
    }

    #[test]
    fn test_eviction_is_insertion_ordered() {
        let mut cache = ResolutionCache::new(Some(2));
        cache.put("T", "a", entry("a"));
        cache.put("T", "b", entry("b"));
        // Reading `a` does not protect it.
        cache.get("T", "a");
        cache.put("T", "c", entry("c"));
        assert!(cache.get("T", "a").is_none());
        assert!(cache.get("T", "b").is_some());
    }

    #[test]
    fn test_disabled_cache_neither_answers_nor_records() {
        let mut cache = ResolutionCache::default();
        cache.put("User", "id", entry("user_id"));
        cache.set_enabled(false);
        assert!(cache.get("User", "id").is_none());
        cache.put("User", "id", entry("user_id"));
        assert_eq!(cache.stats().forward_count, 0);
        assert_eq!(cache.stats().misses, 0);

        cache.set_enabled(true);
        assert!(cache.get("User", "id").is_none());
    }
}
