use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::canonicalize;
use crate::pointer::JsonPointer;
use crate::resolver::ResolvedPlan;
use crate::token::TokenSnapshot;

/// Schema version for the on-disk dependency snapshot format (§6). Incompatible readers
/// must refuse unknown versions rather than guess at a migration.
pub const DEPENDENCY_SNAPSHOT_VERSION: u32 = 1;

/// One pointer's content fingerprint plus the pointers it depends on.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DependencyEntry {
    pub pointer: JsonPointer,
    pub hash: String,
    pub dependencies: Vec<JsonPointer>,
}

/// A versioned, ordered snapshot of every token's dependency fingerprint across a resolved
/// plan, used by the dependency store to compute a base diff (§4.3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct DependencySnapshot {
    pub version: u32,
    pub resolved_at: String,
    pub entries: Vec<DependencyEntry>,
}

impl DependencySnapshot {
    /// Walks a resolved plan and emits a snapshot whose entries are sorted by pointer.
    pub fn from_resolved_plan(plan: &ResolvedPlan, resolved_at: impl Into<String>) -> Self {
        let mut entries: Vec<DependencyEntry> = plan
            .entries
            .iter()
            .flat_map(|source| source.tokens.iter())
            .map(|snapshot| DependencyEntry {
                pointer: snapshot.pointer.clone(),
                hash: hash_snapshot(snapshot),
                dependencies: dependencies_of(snapshot),
            })
            .collect();
        entries.sort_by(|a, b| a.pointer.cmp(&b.pointer));

        Self {
            version: DEPENDENCY_SNAPSHOT_VERSION,
            resolved_at: resolved_at.into(),
            entries,
        }
    }

    pub fn get(&self, pointer: &JsonPointer) -> Option<&DependencyEntry> {
        // Entries are sorted by pointer at construction time, so a binary search would do,
        // but the snapshot sizes involved don't warrant the extra invariant to maintain.
        self.entries.iter().find(|entry| &entry.pointer == pointer)
    }
}

fn dependencies_of(snapshot: &TokenSnapshot) -> Vec<JsonPointer> {
    snapshot
        .resolution
        .as_ref()
        .map(|resolution| resolution.resolution_path.clone())
        .unwrap_or_default()
}

/// A stable digest over a token's type, canonical resolved value, and referenced pointers
/// (§4.3). Two snapshots with the same hash are interchangeable for dependency purposes even
/// if their provenance or context differs.
pub fn hash_snapshot(snapshot: &TokenSnapshot) -> String {
    let mut hasher = Sha256::new();
    if let Some(token_type) = snapshot.token_type() {
        hasher.update(format!("{token_type:?}").as_bytes());
    }
    hasher.update(b"|");
    if let Some(value) = snapshot.effective_value() {
        hasher.update(canonicalize(value).as_bytes());
    }
    hasher.update(b"|");
    for dependency in dependencies_of(snapshot) {
        hasher.update(dependency.as_str().as_bytes());
        hasher.update(b",");
    }
    hex::encode(hasher.finalize())
}
