use std::collections::BTreeMap;

use serde::Serialize;

use crate::token::TokenType;

use super::entry::{ChangedField, DiffEntry, DiffEntryKind, Impact};

/// The semantic-version bump a diff's contents justify: `major` if anything is breaking,
/// else `minor` if there are additions, else `patch` if there are non-breaking changes,
/// else `none` (§4.6 step 5).
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedBump {
    Major,
    Minor,
    Patch,
    None,
}

/// Aggregated counts over a (possibly filtered) set of diff entries.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DiffSummary {
    pub by_kind: BTreeMap<DiffEntryKind, usize>,
    pub breaking: usize,
    pub non_breaking: usize,
    pub value_changed: usize,
    pub metadata_changed: usize,
    pub by_type: BTreeMap<TokenType, usize>,
    pub by_group: BTreeMap<String, usize>,
    pub recommended_bump: RecommendedBump,
}

impl DiffSummary {
    pub fn build(entries: &[(DiffEntry, Impact)]) -> Self {
        let mut by_kind: BTreeMap<DiffEntryKind, usize> = BTreeMap::new();
        let mut breaking = 0;
        let mut non_breaking = 0;
        let mut value_changed = 0;
        let mut metadata_changed = 0;
        let mut by_type: BTreeMap<TokenType, usize> = BTreeMap::new();
        let mut by_group: BTreeMap<String, usize> = BTreeMap::new();

        for (entry, impact) in entries {
            *by_kind.entry(entry.kind()).or_default() += 1;
            match impact {
                Impact::Breaking => breaking += 1,
                Impact::NonBreaking => non_breaking += 1,
            }

            let is_value_changed = match entry {
                DiffEntry::Addition { .. } | DiffEntry::Removal { .. } | DiffEntry::Rename { .. } => true,
                DiffEntry::Modification { changed_fields, .. } => {
                    changed_fields.iter().any(ChangedField::is_breaking_determining)
                }
            };
            if is_value_changed {
                value_changed += 1;
            } else {
                metadata_changed += 1;
            }

            let pointer = entry.filter_pointer();
            if let Some(segment) = pointer.first_segment() {
                *by_group.entry(segment).or_default() += 1;
            }

            let token_type = match entry {
                DiffEntry::Addition { next, .. } => next.token_type(),
                DiffEntry::Removal { previous, .. } => previous.token_type(),
                DiffEntry::Modification { next, .. } => next.token_type(),
                DiffEntry::Rename { next, .. } => next.token_type(),
            };
            if let Some(token_type) = token_type {
                *by_type.entry(token_type).or_default() += 1;
            }
        }

        let recommended_bump = if breaking > 0 {
            RecommendedBump::Major
        } else if by_kind.get(&DiffEntryKind::Addition).copied().unwrap_or(0) > 0 {
            RecommendedBump::Minor
        } else if non_breaking > 0 {
            RecommendedBump::Patch
        } else {
            RecommendedBump::None
        };

        Self {
            by_kind,
            breaking,
            non_breaking,
            value_changed,
            metadata_changed,
            by_type,
            by_group,
            recommended_bump,
        }
    }
}

impl Default for RecommendedBump {
    fn default() -> Self {
        RecommendedBump::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::JsonPointer;
    use crate::token::{Provenance, Token, TokenSnapshot};
    use serde_json::json;
    use std::collections::BTreeMap as Map;

    fn snapshot(pointer: &str) -> TokenSnapshot {
        TokenSnapshot {
            pointer: JsonPointer::parse(pointer),
            source_pointer: None,
            token: Token {
                id: pointer.to_string(),
                token_type: Some(TokenType::Color),
                value: Some(json!(1)),
                raw: None,
                reference: None,
            },
            metadata: None,
            resolution: None,
            provenance: Provenance {
                source_id: "s".into(),
                layer: "l".into(),
                layer_index: 0,
                uri: "u".into(),
                pointer_prefix: JsonPointer::root(),
            },
            context: Map::new(),
        }
    }

    #[test]
    fn breaking_entry_recommends_major() {
        let entries = vec![(
            DiffEntry::Removal {
                pointer: JsonPointer::parse("/a"),
                previous: snapshot("/a"),
            },
            Impact::Breaking,
        )];
        let summary = DiffSummary::build(&entries);
        assert_eq!(summary.recommended_bump, RecommendedBump::Major);
        assert_eq!(summary.breaking, 1);
    }

    #[test]
    fn only_additions_recommend_minor() {
        let entries = vec![(
            DiffEntry::Addition {
                pointer: JsonPointer::parse("/a"),
                next: snapshot("/a"),
            },
            Impact::NonBreaking,
        )];
        let summary = DiffSummary::build(&entries);
        assert_eq!(summary.recommended_bump, RecommendedBump::Minor);
    }

    #[test]
    fn no_entries_recommend_none() {
        let summary = DiffSummary::build(&[]);
        assert_eq!(summary.recommended_bump, RecommendedBump::None);
    }
}
