use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// A cached value together with its absolute expiry instant.
///
/// `expiry == 0` means the entry never expires; anything else is epoch
/// milliseconds. Serialized verbatim to the durable store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoredEntry {
    expiry: u64,
    data: Value,
}

impl StoredEntry {
    fn is_expired(&self, now: u64) -> bool {
        self.expiry != 0 && now >= self.expiry
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Durable key-value cache with per-entry expiry.
///
/// Entries live in an in-memory index backed by one JSON file per key under
/// a single namespace directory. The durable tier is only read during
/// hydration at construction; every later `get` is memory-only. Storage
/// failures (quota, corruption) are recovered internally and never reach
/// callers.
pub struct PersistentCache {
    dir: PathBuf,
    index: RwLock<HashMap<String, StoredEntry>>,
}

impl PersistentCache {
    /// Open (or create) a cache rooted at `dir`, hydrating the memory index
    /// from every unexpired durable entry. Expired and unparseable entries
    /// found during the scan are deleted.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut index = HashMap::new();

        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Cache directory {} unavailable: {e}", dir.display());
        } else {
            Self::hydrate(&dir, &mut index);
            debug!(
                "Cache hydrated with {} entries from {}",
                index.len(),
                dir.display()
            );
        }

        Self {
            dir,
            index: RwLock::new(index),
        }
    }

    fn hydrate(dir: &PathBuf, index: &mut HashMap<String, StoredEntry>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let now = now_millis();

        for file in entries.flatten() {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(key) = urlencoding::decode(stem).map(|k| k.into_owned()) else {
                let _ = fs::remove_file(&path);
                continue;
            };

            let parsed = fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<StoredEntry>(&raw).ok());

            match parsed {
                Some(entry) if !entry.is_expired(now) => {
                    index.insert(key, entry);
                }
                _ => {
                    // Expired or corrupt, either way it is gone
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", urlencoding::encode(key)))
    }

    /// Look up a key. Expired entries are removed from both tiers on touch
    /// and reported as a miss; so are entries whose payload no longer
    /// deserializes as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.index.read().get(key).cloned()?;

        if entry.is_expired(now_millis()) {
            self.remove(key);
            return None;
        }

        match serde_json::from_value(entry.data) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Dropping malformed cache entry {key}: {e}");
                self.remove(key);
                None
            }
        }
    }

    /// Store a value. A `ttl` of `None` means the entry never expires.
    /// Durable-store write failures trigger eviction of the oldest-expiring
    /// 20% of finite-TTL entries and are otherwise swallowed.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) {
        let data = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                warn!("Refusing to cache unserializable value for {key}: {e}");
                return;
            }
        };

        let expiry = ttl.map_or(0, |t| now_millis() + t.as_millis() as u64);
        let entry = StoredEntry { expiry, data };

        let serialized = serde_json::to_string(&entry).unwrap_or_default();
        self.index.write().insert(key.to_string(), entry);

        if let Err(e) = fs::write(self.file_path(key), serialized) {
            warn!("Durable cache write failed for {key}, evicting: {e}");
            self.evict_oldest();
        }
    }

    /// Remove one entry from both tiers.
    pub fn remove(&self, key: &str) {
        self.index.write().remove(key);
        let _ = fs::remove_file(self.file_path(key));
    }

    /// Remove every entry under this cache's namespace.
    pub fn clear(&self) {
        let keys: Vec<String> = self.index.read().keys().cloned().collect();
        for key in keys {
            self.remove(&key);
        }
    }

    /// Sweep out entries past their expiry. Intended to run once at startup
    /// (hydration already skips them, so this matters for long-lived
    /// processes calling it periodically).
    pub fn clear_expired(&self) {
        let now = now_millis();
        let expired: Vec<String> = self
            .index
            .read()
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        if !expired.is_empty() {
            debug!("Clearing {} expired cache entries", expired.len());
        }
        for key in expired {
            self.remove(&key);
        }
    }

    /// Drop the oldest-expiring 20% of finite-TTL entries. Entries that
    /// never expire are not touched by this path.
    fn evict_oldest(&self) {
        let mut expiring: Vec<(String, u64)> = self
            .index
            .read()
            .iter()
            .filter(|(_, e)| e.expiry > 0)
            .map(|(k, e)| (k.clone(), e.expiry))
            .collect();

        expiring.sort_by_key(|(_, expiry)| *expiry);
        let count = expiring.len().div_ceil(5);

        warn!("Evicting {count} of {} expiring cache entries", expiring.len());
        for (key, _) in expiring.into_iter().take(count) {
            self.remove(&key);
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.index.read().len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
}
