use crate::token::TokenSet;

use super::entry::{DiffEntry, Impact};
use super::field::diff_fields;
use super::filter::DiffFilter;
use super::impact::{DefaultImpactStrategy, TokenImpactStrategy};
use super::rename::{DefaultRenameStrategy, TokenRenameStrategy};
use super::summary::DiffSummary;

/// The full result of diffing two token sets: every classified entry (already impact-
/// tagged) plus a summary computed over them.
pub struct DiffResult {
    pub entries: Vec<(DiffEntry, Impact)>,
    pub summary: DiffSummary,
}

impl DiffResult {
    /// Applies a filter, returning only the matching entries with their summary
    /// recomputed over the retained subset (§4.6 step 4).
    pub fn filtered(&self, filter: &DiffFilter) -> DiffResult {
        let entries: Vec<(DiffEntry, Impact)> = self
            .entries
            .iter()
            .filter(|(entry, impact)| filter.matches(entry, *impact))
            .cloned()
            .collect();
        let summary = DiffSummary::build(&entries);
        DiffResult { entries, summary }
    }
}

/// Compares two token sets into a classified, summarised diff (§4.6). Snapshots are
/// iterated in `previous` then `next` order, so the result is independent of how the
/// engine itself was invoked.
pub struct DiffEngine {
    rename_strategy: Box<dyn TokenRenameStrategy>,
    impact_strategy: Box<dyn TokenImpactStrategy>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self {
            rename_strategy: Box::new(DefaultRenameStrategy),
            impact_strategy: Box::new(DefaultImpactStrategy),
        }
    }

    pub fn with_strategies(
        rename_strategy: Box<dyn TokenRenameStrategy>,
        impact_strategy: Box<dyn TokenImpactStrategy>,
    ) -> Self {
        Self {
            rename_strategy,
            impact_strategy,
        }
    }

    pub fn diff(&self, previous: &TokenSet, next: &TokenSet) -> DiffResult {
        // Step 1: classify by pointer membership in iteration order.
        let mut removed = Vec::new();
        let mut common = Vec::new();
        for snapshot in previous.iter() {
            if next.contains(&snapshot.pointer) {
                common.push(snapshot.pointer.clone());
            } else {
                removed.push(snapshot);
            }
        }

        let mut added = Vec::new();
        for snapshot in next.iter() {
            if !previous.contains(&snapshot.pointer) {
                added.push(snapshot);
            }
        }

        // Step 2: rename detection over the residual removed/added snapshots.
        let outcome = self
            .rename_strategy
            .detect(&removed, &added, self.impact_strategy.as_ref());

        let mut entries: Vec<DiffEntry> = Vec::new();

        for rename in outcome.renamed {
            entries.push(DiffEntry::Rename {
                previous_pointer: rename.previous.pointer.clone(),
                next_pointer: rename.next.pointer.clone(),
                previous: rename.previous.clone(),
                next: rename.next.clone(),
                changed_fields: rename.changed_fields,
            });
        }

        for snapshot in outcome.remaining_removed {
            entries.push(DiffEntry::Removal {
                pointer: snapshot.pointer.clone(),
                previous: snapshot.clone(),
            });
        }

        for snapshot in outcome.remaining_added {
            entries.push(DiffEntry::Addition {
                pointer: snapshot.pointer.clone(),
                next: snapshot.clone(),
            });
        }

        for pointer in &common {
            let previous_snapshot = previous.get(pointer).expect("pointer present in previous");
            let next_snapshot = next.get(pointer).expect("pointer present in next");
            let changed_fields = diff_fields(previous_snapshot, next_snapshot);
            if !changed_fields.is_empty() {
                entries.push(DiffEntry::Modification {
                    pointer: pointer.clone(),
                    previous: previous_snapshot.clone(),
                    next: next_snapshot.clone(),
                    changed_fields,
                });
            }
        }

        // Step 3: impact classification.
        let classified: Vec<(DiffEntry, Impact)> = entries
            .into_iter()
            .map(|entry| {
                let impact = self.impact_strategy.classify(&entry);
                (entry, impact)
            })
            .collect();

        let summary = DiffSummary::build(&classified);
        DiffResult {
            entries: classified,
            summary,
        }
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::JsonPointer;
    use crate::token::{Provenance, Token, TokenSnapshot, TokenType};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn snapshot(pointer: &str, value: serde_json::Value) -> TokenSnapshot {
        TokenSnapshot {
            pointer: JsonPointer::parse(pointer),
            source_pointer: None,
            token: Token {
                id: pointer.to_string(),
                token_type: Some(TokenType::Dimension),
                value: Some(value),
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
            context: BTreeMap::new(),
        }
    }

    #[test]
    fn rename_scenario_produces_single_breaking_rename() {
        let mut previous = TokenSet::new();
        previous.insert(snapshot("/a", json!(1)));
        let mut next = TokenSet::new();
        next.insert(snapshot("/b", json!(1)));

        let result = DiffEngine::new().diff(&previous, &next);
        assert_eq!(result.entries.len(), 1);
        let (entry, impact) = &result.entries[0];
        assert!(matches!(entry, DiffEntry::Rename { .. }));
        assert_eq!(*impact, Impact::Breaking);
        assert_eq!(result.summary.recommended_bump, super::super::summary::RecommendedBump::Major);
    }

    #[test]
    fn unchanged_common_pointer_produces_no_entry() {
        let mut previous = TokenSet::new();
        previous.insert(snapshot("/a", json!(1)));
        let mut next = TokenSet::new();
        next.insert(snapshot("/a", json!(1)));

        let result = DiffEngine::new().diff(&previous, &next);
        assert!(result.entries.is_empty());
    }

    #[test]
    fn unrelated_removal_and_addition_stay_separate_without_matching_value() {
        let mut previous = TokenSet::new();
        previous.insert(snapshot("/a", json!(1)));
        let mut next = TokenSet::new();
        next.insert(snapshot("/b", json!(2)));

        let result = DiffEngine::new().diff(&previous, &next);
        assert_eq!(result.entries.len(), 2);
        assert!(result.entries.iter().any(|(e, _)| matches!(e, DiffEntry::Removal { .. })));
        assert!(result.entries.iter().any(|(e, _)| matches!(e, DiffEntry::Addition { .. })));
    }
}
