mod cache;
mod definition;
mod engine;
mod group;
mod selector;

pub use cache::{CacheEntry, ContentAddressedTransformCache, InMemoryTransformCache, TransformCache};
pub use definition::{TransformDefinition, TransformInput, TransformRegistry, TransformRun};
pub use engine::{TransformEngine, TransformRequest, TransformResult};
pub use group::{normalize_group, sort_groups_by_priority};
pub use selector::Selector;
