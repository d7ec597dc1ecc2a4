use crate::canonical::canonicalize;
use crate::token::TokenSnapshot;

use super::entry::ChangedField;

/// Computes the set of fields on which two snapshots of the same (or renamed) token
/// disagree, per §4.6 step 1: `value`/`raw` compared canonicalised and deep; `references`,
/// `resolutionPath`, `appliedAliases` compared as ordered lists; `extensions` compared by
/// key set with deterministic (sorted) ordering.
pub fn diff_fields(previous: &TokenSnapshot, next: &TokenSnapshot) -> Vec<ChangedField> {
    let mut changed = Vec::new();

    if previous.token.token_type != next.token.token_type {
        changed.push(ChangedField::Type);
    }
    if !values_equal(previous.token.value.as_ref(), next.token.value.as_ref()) {
        changed.push(ChangedField::Value);
    }
    if !values_equal(previous.token.raw.as_ref(), next.token.raw.as_ref()) {
        changed.push(ChangedField::Raw);
    }
    if previous.token.reference != next.token.reference {
        changed.push(ChangedField::Reference);
    }

    let previous_resolution = previous.resolution.as_ref();
    let next_resolution = next.resolution.as_ref();
    if previous_resolution.map(|r| &r.references) != next_resolution.map(|r| &r.references) {
        changed.push(ChangedField::References);
    }
    if previous_resolution.map(|r| &r.resolution_path) != next_resolution.map(|r| &r.resolution_path) {
        changed.push(ChangedField::ResolutionPath);
    }
    if previous_resolution.map(|r| &r.applied_aliases) != next_resolution.map(|r| &r.applied_aliases) {
        changed.push(ChangedField::AppliedAliases);
    }

    let previous_meta = previous.metadata.as_ref();
    let next_meta = next.metadata.as_ref();
    if previous_meta.and_then(|m| m.description.as_ref()) != next_meta.and_then(|m| m.description.as_ref()) {
        changed.push(ChangedField::Description);
    }
    if previous_meta.and_then(|m| m.deprecated) != next_meta.and_then(|m| m.deprecated) {
        changed.push(ChangedField::Deprecated);
    }
    if previous_meta.and_then(|m| m.tags.as_ref()) != next_meta.and_then(|m| m.tags.as_ref()) {
        changed.push(ChangedField::Tags);
    }

    let empty = std::collections::BTreeMap::new();
    let previous_extensions = previous_meta.map(|m| &m.extensions).unwrap_or(&empty);
    let next_extensions = next_meta.map(|m| &m.extensions).unwrap_or(&empty);
    if previous_extensions.keys().collect::<Vec<_>>() != next_extensions.keys().collect::<Vec<_>>()
        || previous_extensions != next_extensions
    {
        changed.push(ChangedField::Extensions);
    }

    changed
}

fn values_equal(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => canonicalize(a) == canonicalize(b),
        _ => false,
    }
}
