//! Bounded read cache for GET replies, keyed by request path.
//! Least recently used entry is evicted once the capacity is reached.

use std::collections::{HashMap, VecDeque};

use super::types::Reply;

pub const DEFAULT_CACHE_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct ReplyCache {
    capacity: usize,
    entries: HashMap<String, Reply>,
    /// Front is least recently used
    order: VecDeque<String>,
}

impl ReplyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&mut self, path: &str) -> Option<Reply> {
        let reply = self.entries.get(path)?.clone();
        self.touch(path);
        Some(reply)
    }

    pub fn insert(&mut self, path: &str, reply: Reply) {
        if self.entries.insert(path.to_string(), reply).is_some() {
            self.touch(path);
            return;
        }

        self.order.push_back(path.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn touch(&mut self, path: &str) {
        if let Some(pos) = self.order.iter().position(|p| p == path) {
            if let Some(key) = self.order.remove(pos) {
                self.order.push_back(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_is_bounded() {
        let mut cache = ReplyCache::new(DEFAULT_CACHE_CAPACITY);
        for i in 0..100 {
            cache.insert(&format!("/redfish/v1/Chassis/{}", i), Reply::new(200, "{}"));
        }
        assert_eq!(cache.len(), DEFAULT_CACHE_CAPACITY);
        assert!(cache.get("/redfish/v1/Chassis/0").is_none());
        assert!(cache.get("/redfish/v1/Chassis/99").is_some());
    }

    #[test]
    fn test_recently_used_entry_survives_eviction() {
        let mut cache = ReplyCache::new(2);
        cache.insert("/a", Reply::new(200, "a"));
        cache.insert("/b", Reply::new(200, "b"));
        assert_eq!(cache.get("/a").map(|r| r.body), Some("a".to_string()));

        cache.insert("/c", Reply::new(200, "c"));
        assert!(cache.get("/a").is_some());
        assert!(cache.get("/b").is_none());
        assert!(cache.get("/c").is_some());
    }

    #[test]
    fn test_reinsert_replaces_without_growing() {
        let mut cache = ReplyCache::new(2);
        cache.insert("/a", Reply::new(200, "old"));
        cache.insert("/a", Reply::new(200, "new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/a").map(|r| r.body), Some("new".to_string()));
    }
}
