mod engine;
mod entry;
mod field;
mod filter;
mod impact;
mod rename;
mod summary;

pub use engine::{DiffEngine, DiffResult};
pub use entry::{ChangedField, DiffEntry, DiffEntryKind, Impact};
pub use field::diff_fields;
pub use filter::DiffFilter;
pub use impact::{DefaultImpactStrategy, TokenImpactStrategy};
pub use rename::{DefaultRenameStrategy, RenameMatch, RenameOutcome, TokenRenameStrategy};
pub use summary::{DiffSummary, RecommendedBump};
