use parking_lot::Mutex;
use std::collections::HashMap;

/// Opaque key/value store for a document's content fingerprint, keyed by `source_id::uri`.
pub trait DocumentCache: Send + Sync {
    fn get_fingerprint(&self, key: &str) -> Option<String>;
    fn put_fingerprint(&self, key: &str, fingerprint: String);
}

/// Opaque key/value store for a resolved token snapshot's serialized bytes, keyed the same
/// way as [`DocumentCache`].
pub trait TokenCache: Send + Sync {
    fn get_tokens(&self, key: &str) -> Option<Vec<u8>>;
    fn put_tokens(&self, key: &str, bytes: Vec<u8>);
}

/// In-memory `DocumentCache`/`TokenCache` pair, useful for tests and single-process embedders.
#[derive(Default)]
pub struct InMemoryResolverCache {
    fingerprints: Mutex<HashMap<String, String>>,
    tokens: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryResolverCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentCache for InMemoryResolverCache {
    fn get_fingerprint(&self, key: &str) -> Option<String> {
        self.fingerprints.lock().get(key).cloned()
    }

    fn put_fingerprint(&self, key: &str, fingerprint: String) {
        self.fingerprints.lock().insert(key.to_string(), fingerprint);
    }
}

impl TokenCache for InMemoryResolverCache {
    fn get_tokens(&self, key: &str) -> Option<Vec<u8>> {
        self.tokens.lock().get(key).cloned()
    }

    fn put_tokens(&self, key: &str, bytes: Vec<u8>) {
        self.tokens.lock().insert(key.to_string(), bytes);
    }
}

/// How a single planned source's resolution was satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Skip,
}

pub fn document_fingerprint(document: &serde_json::Value) -> String {
    use sha2::{Digest, Sha256};
    let canonical = crate::canonical::canonicalize(document);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
