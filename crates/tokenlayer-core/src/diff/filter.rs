use globset::{Glob, GlobSetBuilder};

use crate::token::TokenType;

use super::entry::{DiffEntry, DiffEntryKind, Impact};

/// Optional predicate restricting which diff entries are retained; an entry is kept only
/// if it satisfies every predicate that is present (§4.6 step 4).
#[derive(Clone, Debug, Default)]
pub struct DiffFilter {
    pub types: Option<Vec<TokenType>>,
    pub paths: Option<Vec<String>>,
    pub groups: Option<Vec<String>>,
    pub impacts: Option<Vec<Impact>>,
    pub kinds: Option<Vec<DiffEntryKind>>,
}

impl DiffFilter {
    pub fn matches(&self, entry: &DiffEntry, impact: Impact) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&entry.kind()) {
                return false;
            }
        }
        if let Some(impacts) = &self.impacts {
            if !impacts.contains(&impact) {
                return false;
            }
        }

        let pointer = entry.filter_pointer();

        if let Some(types) = &self.types {
            let token_type = match entry {
                DiffEntry::Addition { next, .. } => next.token_type(),
                DiffEntry::Removal { previous, .. } => previous.token_type(),
                DiffEntry::Modification { next, .. } => next.token_type(),
                DiffEntry::Rename { next, .. } => next.token_type(),
            };
            if !token_type.map(|t| types.contains(&t)).unwrap_or(false) {
                return false;
            }
        }

        if let Some(paths) = &self.paths {
            let mut builder = GlobSetBuilder::new();
            for pattern in paths {
                if let Ok(glob) = Glob::new(pattern) {
                    builder.add(glob);
                }
            }
            let matches = builder
                .build()
                .map(|set| set.is_match(pointer.as_str()))
                .unwrap_or(false);
            if !matches {
                return false;
            }
        }

        if let Some(groups) = &self.groups {
            let matches = pointer
                .first_segment()
                .map(|segment| groups.contains(&segment))
                .unwrap_or(false);
            if !matches {
                return false;
            }
        }

        true
    }
}
