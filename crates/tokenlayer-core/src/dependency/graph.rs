use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::pointer::JsonPointer;

use super::snapshot::DependencySnapshot;

/// Reverse-edge view of a dependency snapshot: for each pointer, the pointers that directly
/// depend on it. Cycles are permitted; traversal tracks a visited set rather than assuming a
/// DAG (§9 design notes).
pub struct DependencyGraph {
    dependents: BTreeMap<JsonPointer, Vec<JsonPointer>>,
}

impl DependencyGraph {
    pub fn from_snapshot(snapshot: &DependencySnapshot) -> Self {
        let mut dependents: BTreeMap<JsonPointer, Vec<JsonPointer>> = BTreeMap::new();
        for entry in &snapshot.entries {
            for dependency in &entry.dependencies {
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .push(entry.pointer.clone());
            }
        }
        Self { dependents }
    }

    pub fn dependents_of(&self, pointer: &JsonPointer) -> &[JsonPointer] {
        self.dependents
            .get(pointer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// How far a change propagates through the dependents relation (§4.3).
#[derive(Clone, Copy, Debug)]
pub struct ExpansionPolicy {
    pub transitive: bool,
    /// `None` means unlimited depth.
    pub max_depth: Option<usize>,
}

impl ExpansionPolicy {
    pub fn unlimited() -> Self {
        Self {
            transitive: true,
            max_depth: None,
        }
    }

    fn depth_limit(&self) -> Option<usize> {
        if self.transitive {
            self.max_depth
        } else {
            // transitive=false clamps maxDepth to min(k, 1); an absent (infinite) maxDepth
            // clamps to 1 as well, since min(infinity, 1) = 1.
            Some(self.max_depth.map(|depth| depth.min(1)).unwrap_or(1))
        }
    }
}

/// Expands `changed ∪ removed` through `graph`'s dependents relation per `policy`, returning
/// the full propagated change set. Monotone in `max_depth`: widening the limit never shrinks
/// the result (§8 testable properties).
pub fn expand_changed(
    graph: &DependencyGraph,
    changed: &HashSet<JsonPointer>,
    removed: &HashSet<JsonPointer>,
    policy: ExpansionPolicy,
) -> HashSet<JsonPointer> {
    let depth_limit = policy.depth_limit();

    let mut result: HashSet<JsonPointer> = changed.union(removed).cloned().collect();
    let mut visited = result.clone();
    let mut queue: VecDeque<(JsonPointer, usize)> =
        result.iter().cloned().map(|pointer| (pointer, 0)).collect();

    while let Some((pointer, depth)) = queue.pop_front() {
        if let Some(limit) = depth_limit {
            if depth >= limit {
                continue;
            }
        }
        for dependent in graph.dependents_of(&pointer) {
            if visited.insert(dependent.clone()) {
                result.insert(dependent.clone());
                queue.push_back((dependent.clone(), depth + 1));
            }
        }
    }

    result
}
