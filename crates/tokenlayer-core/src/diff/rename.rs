use std::collections::BTreeMap;

use crate::canonical::canonicalize;
use crate::token::TokenSnapshot;

use super::entry::ChangedField;
use super::field::diff_fields;
use super::impact::TokenImpactStrategy;

/// One detected rename: the matched previous/next pair plus the fields that differ beyond
/// the pointer itself.
pub struct RenameMatch<'a> {
    pub previous: &'a TokenSnapshot,
    pub next: &'a TokenSnapshot,
    pub changed_fields: Vec<ChangedField>,
}

/// Result of a rename pass: matched pairs plus whatever remains unmatched on each side
/// (§4.6 step 2).
pub struct RenameOutcome<'a> {
    pub renamed: Vec<RenameMatch<'a>>,
    pub remaining_removed: Vec<&'a TokenSnapshot>,
    pub remaining_added: Vec<&'a TokenSnapshot>,
}

/// Detects renames among the residual removed/added snapshots left after exact-pointer
/// matching. Implementations receive the configured impact strategy so a custom strategy
/// may weigh candidate matches by how breaking the resulting modification would be; the
/// default strategy ignores it.
pub trait TokenRenameStrategy: Send + Sync {
    fn detect<'a>(
        &self,
        removed: &[&'a TokenSnapshot],
        added: &[&'a TokenSnapshot],
        impact_strategy: &dyn TokenImpactStrategy,
    ) -> RenameOutcome<'a>;
}

/// Matches `(type, deep-equal effective value)` pairs across the residual sets; ties
/// between multiple equally-keyed candidates are broken by lexicographic pointer order
/// on both sides (§4.6 step 2).
#[derive(Default)]
pub struct DefaultRenameStrategy;

impl TokenRenameStrategy for DefaultRenameStrategy {
    fn detect<'a>(
        &self,
        removed: &[&'a TokenSnapshot],
        added: &[&'a TokenSnapshot],
        _impact_strategy: &dyn TokenImpactStrategy,
    ) -> RenameOutcome<'a> {
        let mut removed_sorted: Vec<&'a TokenSnapshot> = removed.to_vec();
        removed_sorted.sort_by(|a, b| a.pointer.cmp(&b.pointer));

        let mut added_sorted: Vec<&'a TokenSnapshot> = added.to_vec();
        added_sorted.sort_by(|a, b| a.pointer.cmp(&b.pointer));

        let mut added_by_key: BTreeMap<RenameKey, Vec<&'a TokenSnapshot>> = BTreeMap::new();
        for snapshot in &added_sorted {
            added_by_key.entry(rename_key(snapshot)).or_default().push(snapshot);
        }

        let mut renamed = Vec::new();
        let mut remaining_removed = Vec::new();
        let mut matched_added = std::collections::HashSet::new();

        for snapshot in &removed_sorted {
            let key = rename_key(snapshot);
            let candidate = added_by_key
                .get_mut(&key)
                .and_then(|bucket| {
                    let idx = bucket
                        .iter()
                        .position(|candidate| !matched_added.contains(&candidate.pointer))?;
                    Some(bucket[idx])
                });

            match candidate {
                Some(matched) => {
                    matched_added.insert(matched.pointer.clone());
                    let changed_fields = diff_fields(snapshot, matched);
                    renamed.push(RenameMatch {
                        previous: snapshot,
                        next: matched,
                        changed_fields,
                    });
                }
                None => remaining_removed.push(*snapshot),
            }
        }

        let remaining_added = added_sorted
            .into_iter()
            .filter(|snapshot| !matched_added.contains(&snapshot.pointer))
            .collect();

        RenameOutcome {
            renamed,
            remaining_removed,
            remaining_added,
        }
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RenameKey {
    token_type: Option<crate::token::TokenType>,
    value: String,
}

fn rename_key(snapshot: &TokenSnapshot) -> RenameKey {
    RenameKey {
        token_type: snapshot.token_type(),
        value: snapshot
            .effective_value()
            .map(canonicalize)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::impact::DefaultImpactStrategy;
    use crate::pointer::JsonPointer;
    use crate::token::{Provenance, Token, TokenType};
    use serde_json::json;
    use std::collections::BTreeMap as Map;

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
            context: Map::new(),
        }
    }

    #[test]
    fn matches_single_rename_by_type_and_value() {
        let removed = snapshot("/a", json!(1));
        let added = snapshot("/b", json!(1));
        let removed_refs = vec![&removed];
        let added_refs = vec![&added];

        let outcome = DefaultRenameStrategy.detect(&removed_refs, &added_refs, &DefaultImpactStrategy);
        assert_eq!(outcome.renamed.len(), 1);
        assert_eq!(outcome.renamed[0].previous.pointer.as_str(), "/a");
        assert_eq!(outcome.renamed[0].next.pointer.as_str(), "/b");
        assert!(outcome.remaining_removed.is_empty());
        assert!(outcome.remaining_added.is_empty());
    }

    #[test]
    fn ties_are_broken_lexicographically() {
        let removed_a = snapshot("/z-removed", json!(1));
        let added_first = snapshot("/a-added", json!(1));
        let added_second = snapshot("/b-added", json!(1));
        let removed_refs = vec![&removed_a];
        let added_refs = vec![&added_second, &added_first];

        let outcome = DefaultRenameStrategy.detect(&removed_refs, &added_refs, &DefaultImpactStrategy);
        assert_eq!(outcome.renamed.len(), 1);
        assert_eq!(outcome.renamed[0].next.pointer.as_str(), "/a-added");
        assert_eq!(outcome.remaining_added.len(), 1);
        assert_eq!(outcome.remaining_added[0].pointer.as_str(), "/b-added");
    }

    #[test]
    fn mismatched_value_does_not_match() {
        let removed = snapshot("/a", json!(1));
        let added = snapshot("/b", json!(2));
        let removed_refs = vec![&removed];
        let added_refs = vec![&added];

        let outcome = DefaultRenameStrategy.detect(&removed_refs, &added_refs, &DefaultImpactStrategy);
        assert!(outcome.renamed.is_empty());
        assert_eq!(outcome.remaining_removed.len(), 1);
        assert_eq!(outcome.remaining_added.len(), 1);
    }
}
