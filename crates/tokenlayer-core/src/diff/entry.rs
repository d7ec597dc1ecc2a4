use serde::Serialize;

use crate::pointer::JsonPointer;
use crate::token::TokenSnapshot;

/// A single `changes` member (§4.6 step 1): the set of fields on which a common pointer's
/// previous and next snapshot disagree.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum ChangedField {
    Type,
    Value,
    Raw,
    Reference,
    References,
    ResolutionPath,
    AppliedAliases,
    Extensions,
    Description,
    Deprecated,
    Tags,
}

impl ChangedField {
    /// Fields that determine breaking-ness for a modification (§4.6 step 3).
    pub fn is_breaking_determining(self) -> bool {
        matches!(
            self,
            ChangedField::Value | ChangedField::Raw | ChangedField::Reference | ChangedField::Type
        )
    }
}

/// Whether a change alters the token's observable value/type or is purely metadata (§4.6
/// step 3, summary's value-changed vs metadata-changed breakdown).
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Impact {
    Breaking,
    NonBreaking,
}

/// The discriminant used by the `kinds` diff filter and the summary's per-category counts.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DiffEntryKind {
    Addition,
    Removal,
    Modification,
    Rename,
}

/// One classified difference between a `previous` and `next` token set (§4.6).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiffEntry {
    Addition {
        pointer: JsonPointer,
        next: TokenSnapshot,
    },
    Removal {
        pointer: JsonPointer,
        previous: TokenSnapshot,
    },
    Modification {
        pointer: JsonPointer,
        previous: TokenSnapshot,
        next: TokenSnapshot,
        changed_fields: Vec<ChangedField>,
    },
    Rename {
        previous_pointer: JsonPointer,
        next_pointer: JsonPointer,
        previous: TokenSnapshot,
        next: TokenSnapshot,
        changed_fields: Vec<ChangedField>,
    },
}

impl DiffEntry {
    pub fn kind(&self) -> DiffEntryKind {
        match self {
            DiffEntry::Addition { .. } => DiffEntryKind::Addition,
            DiffEntry::Removal { .. } => DiffEntryKind::Removal,
            DiffEntry::Modification { .. } => DiffEntryKind::Modification,
            DiffEntry::Rename { .. } => DiffEntryKind::Rename,
        }
    }

    /// The pointer used for path/group filtering: `next`'s pointer where one exists,
    /// otherwise `previous`'s.
    pub fn filter_pointer(&self) -> &JsonPointer {
        match self {
            DiffEntry::Addition { pointer, .. } => pointer,
            DiffEntry::Removal { pointer, .. } => pointer,
            DiffEntry::Modification { pointer, .. } => pointer,
            DiffEntry::Rename { next_pointer, .. } => next_pointer,
        }
    }

    pub fn impact(&self, strategy: &dyn super::impact::TokenImpactStrategy) -> Impact {
        strategy.classify(self)
    }
}
