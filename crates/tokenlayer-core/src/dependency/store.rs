use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::pointer::JsonPointer;

use super::snapshot::{DependencySnapshot, DEPENDENCY_SNAPSHOT_VERSION};

/// `changed = { p : hash(p, old) != hash(p, new) }`, `removed = { p : p in old, p not in
/// new }` (§4.3 base diff).
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct DependencyDiff {
    pub changed: HashSet<JsonPointer>,
    pub removed: HashSet<JsonPointer>,
}

/// Dependency store port (§6): `evaluate(snapshot) -> { changed, removed }`, `commit(snapshot)`.
pub trait DependencyStore: Send + Sync {
    fn evaluate(&self, snapshot: &DependencySnapshot) -> PipelineResult<DependencyDiff>;
    fn commit(&self, snapshot: &DependencySnapshot) -> PipelineResult<()>;
}

/// Computes the base diff against an optional prior snapshot. With no prior snapshot, every
/// pointer in `next` is reported changed — the documented fallback when no store is present.
pub fn diff_against(
    previous: Option<&DependencySnapshot>,
    next: &DependencySnapshot,
) -> DependencyDiff {
    let Some(previous) = previous else {
        return DependencyDiff {
            changed: next.entries.iter().map(|e| e.pointer.clone()).collect(),
            removed: HashSet::new(),
        };
    };

    let mut changed = HashSet::new();
    for entry in &next.entries {
        match previous.get(&entry.pointer) {
            Some(prior) if prior.hash == entry.hash => {}
            _ => {
                changed.insert(entry.pointer.clone());
            }
        }
    }

    let mut removed = HashSet::new();
    for entry in &previous.entries {
        if next.get(&entry.pointer).is_none() {
            removed.insert(entry.pointer.clone());
        }
    }

    DependencyDiff { changed, removed }
}

/// In-memory store holding the most recently committed snapshot, for tests and single-process
/// embedders that don't need cross-run persistence.
#[derive(Default)]
pub struct InMemoryDependencyStore {
    previous: Mutex<Option<DependencySnapshot>>,
}

impl InMemoryDependencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DependencyStore for InMemoryDependencyStore {
    fn evaluate(&self, snapshot: &DependencySnapshot) -> PipelineResult<DependencyDiff> {
        Ok(diff_against(self.previous.lock().as_ref(), snapshot))
    }

    fn commit(&self, snapshot: &DependencySnapshot) -> PipelineResult<()> {
        *self.previous.lock() = Some(snapshot.clone());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Manifest {
    version: u32,
}

/// Persists the last-committed snapshot to a content-addressed directory keyed by a
/// workspace-root fingerprint, mirroring the transform cache's persistence strategy (§4.3). A
/// `manifest.json` sidecar records the schema version; an advisory `.lock` file guards against
/// two concurrent writers but never blocks a reader.
pub struct FileDependencyStore {
    root: PathBuf,
}

impl FileDependencyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.root.join("snapshot.json")
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    fn read_previous(&self) -> PipelineResult<Option<DependencySnapshot>> {
        let snapshot_path = self.snapshot_path();
        if !snapshot_path.exists() {
            return Ok(None);
        }

        if let Ok(raw) = fs::read_to_string(self.manifest_path()) {
            let manifest: Manifest = serde_json::from_str(&raw)?;
            if manifest.version != DEPENDENCY_SNAPSHOT_VERSION {
                return Err(PipelineError::Cache(format!(
                    "unsupported dependency snapshot version {} (expected {})",
                    manifest.version, DEPENDENCY_SNAPSHOT_VERSION
                )));
            }
        }

        let raw = fs::read_to_string(snapshot_path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn with_advisory_lock<T>(&self, work: impl FnOnce() -> PipelineResult<T>) -> PipelineResult<T> {
        fs::create_dir_all(&self.root)?;
        let lock_path = self.lock_path();
        if fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .is_err()
        {
            tracing::warn!(path = %lock_path.display(), "dependency store lock already held; proceeding anyway");
        }
        let result = work();
        let _ = fs::remove_file(&lock_path);
        result
    }
}

impl DependencyStore for FileDependencyStore {
    fn evaluate(&self, snapshot: &DependencySnapshot) -> PipelineResult<DependencyDiff> {
        let previous = self.read_previous()?;
        Ok(diff_against(previous.as_ref(), snapshot))
    }

    fn commit(&self, snapshot: &DependencySnapshot) -> PipelineResult<()> {
        self.with_advisory_lock(|| {
            fs::write(
                self.manifest_path(),
                serde_json::to_vec(&Manifest {
                    version: DEPENDENCY_SNAPSHOT_VERSION,
                })?,
            )?;
            fs::write(self.snapshot_path(), serde_json::to_vec_pretty(snapshot)?)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::snapshot::DependencyEntry;

    fn snapshot(entries: &[(&str, &str)]) -> DependencySnapshot {
        DependencySnapshot {
            version: DEPENDENCY_SNAPSHOT_VERSION,
            resolved_at: "2026-01-01T00:00:00Z".into(),
            entries: entries
                .iter()
                .map(|(pointer, hash)| DependencyEntry {
                    pointer: JsonPointer::parse(pointer),
                    hash: hash.to_string(),
                    dependencies: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn no_prior_snapshot_marks_everything_changed() {
        let next = snapshot(&[("/a", "h1")]);
        let diff = diff_against(None, &next);
        assert_eq!(diff.changed.len(), 1);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn identical_snapshot_yields_empty_diff() {
        let snap = snapshot(&[("/a", "h1"), ("/b", "h2")]);
        let diff = diff_against(Some(&snap), &snap);
        assert!(diff.changed.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn hash_change_and_removal_are_both_reported() {
        let previous = snapshot(&[("/a", "h1"), ("/b", "h2")]);
        let next = snapshot(&[("/a", "h1-changed")]);
        let diff = diff_against(Some(&previous), &next);
        assert_eq!(diff.changed, HashSet::from([JsonPointer::parse("/a")]));
        assert_eq!(diff.removed, HashSet::from([JsonPointer::parse("/b")]));
    }

    #[test]
    fn in_memory_store_is_idempotent_after_commit() {
        let store = InMemoryDependencyStore::new();
        let snap = snapshot(&[("/a", "h1")]);
        let diff = store.evaluate(&snap).unwrap();
        assert_eq!(diff.changed.len(), 1);

        store.commit(&snap).unwrap();
        let diff_again = store.evaluate(&snap).unwrap();
        assert!(diff_again.changed.is_empty());
        assert!(diff_again.removed.is_empty());
    }

    #[test]
    fn file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDependencyStore::new(dir.path().to_path_buf());
        let snap = snapshot(&[("/a", "h1")]);

        assert_eq!(store.evaluate(&snap).unwrap().changed.len(), 1);
        store.commit(&snap).unwrap();
        let diff = store.evaluate(&snap).unwrap();
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn file_store_rejects_unknown_manifest_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDependencyStore::new(dir.path().to_path_buf());
        let snap = snapshot(&[("/a", "h1")]);
        store.commit(&snap).unwrap();

        fs::write(
            dir.path().join("manifest.json"),
            serde_json::to_vec(&Manifest { version: 99 }).unwrap(),
        )
        .unwrap();

        assert!(store.evaluate(&snap).is_err());
    }
}
