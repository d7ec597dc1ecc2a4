use super::entry::{DiffEntry, Impact};

/// Classifies a diff entry's impact. The default rules (§4.6 step 3) are: additions are
/// non-breaking; removals and renames are breaking; modifications are breaking iff any
/// changed field is value-determining (`value`, `raw`, `ref`, `type`).
pub trait TokenImpactStrategy: Send + Sync {
    fn classify(&self, entry: &DiffEntry) -> Impact;
}

#[derive(Default)]
pub struct DefaultImpactStrategy;

impl TokenImpactStrategy for DefaultImpactStrategy {
    fn classify(&self, entry: &DiffEntry) -> Impact {
        match entry {
            DiffEntry::Addition { .. } => Impact::NonBreaking,
            DiffEntry::Removal { .. } => Impact::Breaking,
            DiffEntry::Rename { .. } => Impact::Breaking,
            DiffEntry::Modification { changed_fields, .. } => {
                if changed_fields.iter().any(|field| field.is_breaking_determining()) {
                    Impact::Breaking
                } else {
                    Impact::NonBreaking
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::entry::ChangedField;
    use crate::pointer::JsonPointer;
    use crate::token::{Provenance, Token, TokenSnapshot, TokenType};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn snapshot(pointer: &str) -> TokenSnapshot {
        TokenSnapshot {
            pointer: JsonPointer::parse(pointer),
            source_pointer: None,
            token: Token {
                id: pointer.to_string(),
                token_type: Some(TokenType::Color),
                value: Some(json!("#fff")),
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
    fn modification_is_breaking_only_when_value_determining_field_changed() {
        let strategy = DefaultImpactStrategy;
        let metadata_only = DiffEntry::Modification {
            pointer: JsonPointer::parse("/a"),
            previous: snapshot("/a"),
            next: snapshot("/a"),
            changed_fields: vec![ChangedField::Description],
        };
        assert_eq!(strategy.classify(&metadata_only), Impact::NonBreaking);

        let value_changed = DiffEntry::Modification {
            pointer: JsonPointer::parse("/a"),
            previous: snapshot("/a"),
            next: snapshot("/a"),
            changed_fields: vec![ChangedField::Value],
        };
        assert_eq!(strategy.classify(&value_changed), Impact::Breaking);
    }

    #[test]
    fn addition_is_non_breaking_removal_and_rename_are_breaking() {
        let strategy = DefaultImpactStrategy;
        assert_eq!(
            strategy.classify(&DiffEntry::Addition {
                pointer: JsonPointer::parse("/a"),
                next: snapshot("/a"),
            }),
            Impact::NonBreaking
        );
        assert_eq!(
            strategy.classify(&DiffEntry::Removal {
                pointer: JsonPointer::parse("/a"),
                previous: snapshot("/a"),
            }),
            Impact::Breaking
        );
        assert_eq!(
            strategy.classify(&DiffEntry::Rename {
                previous_pointer: JsonPointer::parse("/a"),
                next_pointer: JsonPointer::parse("/b"),
                previous: snapshot("/a"),
                next: snapshot("/b"),
                changed_fields: vec![],
            }),
            Impact::Breaking
        );
    }
}
