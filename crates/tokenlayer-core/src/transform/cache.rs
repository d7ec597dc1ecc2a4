use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One cached transform output, keyed by input fingerprint (§4.4, §6).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: JsonValue,
    pub written_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// Transform cache port (§6): `get(key) -> entry?`, `set(key, entry)`, with an optional
/// per-entry TTL. At-most-one concurrent recomputation per key is not required — determinism
/// of `run` makes duplicate work merely wasteful, not incorrect.
pub trait TransformCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: &str, entry: CacheEntry);
}

/// In-memory cache with no eviction policy beyond process lifetime.
#[derive(Default)]
pub struct InMemoryTransformCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryTransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl TransformCache for InMemoryTransformCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().insert(key.to_string(), entry);
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedMetadata {
    written_at: String,
    written_at_epoch_ms: u64,
    ttl_secs: Option<u64>,
    metadata: Option<JsonValue>,
}

/// Persistent cache keyed in a content-addressed directory: `sha256(key)` names the value
/// file, with a sidecar `.meta.json` recording `{ writtenAt, ttl? }` (§6 persisted transform
/// cache entry). Entries past their TTL are treated as absent.
pub struct ContentAddressedTransformCache {
    root: PathBuf,
    ttl: Option<Duration>,
}

impl ContentAddressedTransformCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn digest(key: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn value_path(&self, digest: &str) -> PathBuf {
        self.root.join(format!("{digest}.value.json"))
    }

    fn meta_path(&self, digest: &str) -> PathBuf {
        self.root.join(format!("{digest}.meta.json"))
    }
}

impl TransformCache for ContentAddressedTransformCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let digest = Self::digest(key);
        let meta_raw = fs::read_to_string(self.meta_path(&digest)).ok()?;
        let meta: PersistedMetadata = serde_json::from_str(&meta_raw).ok()?;

        if let Some(ttl_secs) = meta.ttl_secs {
            let now_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            if now_ms.saturating_sub(meta.written_at_epoch_ms) > ttl_secs * 1000 {
                return None;
            }
        }

        let value_raw = fs::read(self.value_path(&digest)).ok()?;
        let value: JsonValue = serde_json::from_slice(&value_raw).ok()?;
        Some(CacheEntry {
            key: key.to_string(),
            value,
            written_at: meta.written_at,
            metadata: meta.metadata,
        })
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        let digest = Self::digest(key);
        if fs::create_dir_all(&self.root).is_err() {
            return;
        }

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let meta = PersistedMetadata {
            written_at: entry.written_at.clone(),
            written_at_epoch_ms: now_ms,
            ttl_secs: self.ttl.map(|ttl| ttl.as_secs()),
            metadata: entry.metadata.clone(),
        };

        if let (Ok(value_bytes), Ok(meta_bytes)) = (
            serde_json::to_vec(&entry.value),
            serde_json::to_vec(&meta),
        ) {
            let _ = fs::write(self.value_path(&digest), value_bytes);
            let _ = fs::write(self.meta_path(&digest), meta_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: JsonValue) -> CacheEntry {
        CacheEntry {
            key: "k".into(),
            value,
            written_at: "2026-01-01T00:00:00Z".into(),
            metadata: None,
        }
    }

    #[test]
    fn in_memory_cache_round_trips() {
        let cache = InMemoryTransformCache::new();
        assert!(cache.get("k").is_none());
        cache.set("k", entry(serde_json::json!(8)));
        assert_eq!(cache.get("k").unwrap().value, serde_json::json!(8));
    }

    #[test]
    fn content_addressed_cache_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentAddressedTransformCache::new(dir.path().to_path_buf());
        cache.set("transform::/a::v1", entry(serde_json::json!({"doubled": 8})));
        let found = cache.get("transform::/a::v1").unwrap();
        assert_eq!(found.value, serde_json::json!({"doubled": 8}));
    }

    #[test]
    fn content_addressed_cache_expires_past_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache =
            ContentAddressedTransformCache::new(dir.path().to_path_buf()).with_ttl(Duration::from_secs(0));
        cache.set("k", entry(serde_json::json!(1)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }
}
