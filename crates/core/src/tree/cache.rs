use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::model::File;

/// One cached, unfiltered merged tree.
#[derive(Debug, Clone)]
struct Entry {
    tree: Vec<File>,
    inserted_at: Instant,
}

/// TTL-keyed cache of merged trees, keyed by base path. No LRU eviction:
/// the key space is bounded by distinct client-requested base paths.
#[derive(Debug, Default)]
pub struct TreeCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Returns the cached unfiltered tree for `key` if present and not
    /// past `ttl`. A stale entry is left in place; `insert` will
    /// overwrite it on the next miss-triggered rebuild.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<Vec<File>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > ttl {
            return None;
        }
        Some(entry.tree.clone())
    }

    pub fn insert(&self, key: String, tree: Vec<File>) {
        self.entries.write().insert(key, Entry { tree, inserted_at: Instant::now() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::LogPath;

    fn file(key: &str) -> File {
        File { key: key.to_string(), path: LogPath::from_segments([key.to_string()]), is_dir: false, instances: vec![] }
    }

    #[test]
    fn hit_within_ttl_returns_entry() {
        let cache = TreeCache::new();
        cache.insert("".to_string(), vec![file("a.log")]);
        let hit = cache.get("", Duration::from_secs(60));
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().len(), 1);
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = TreeCache::new();
        assert!(cache.get("nope", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let cache = TreeCache::new();
        cache.insert("".to_string(), vec![file("a.log")]);
        assert!(cache.get("", Duration::from_secs(0)).is_none());
    }
}
