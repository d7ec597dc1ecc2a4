mod graph;
mod snapshot;
mod store;

pub use graph::{expand_changed, DependencyGraph, ExpansionPolicy};
pub use snapshot::{hash_snapshot, DependencyEntry, DependencySnapshot, DEPENDENCY_SNAPSHOT_VERSION};
pub use store::{diff_against, DependencyDiff, DependencyStore, FileDependencyStore, InMemoryDependencyStore};
