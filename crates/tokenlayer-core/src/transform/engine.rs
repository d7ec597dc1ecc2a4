use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::canonicalize;
use crate::pointer::JsonPointer;
use crate::token::{TokenSet, TokenSnapshot};

use super::cache::{CacheEntry, TransformCache};
use super::definition::{TransformDefinition, TransformInput, TransformRegistry};
use super::group::normalize_group;

/// `{ snapshots, changedPointers?, group? }` (§4.4). `changed_pointers = None` means
/// "unconditional": every applicable pair is recomputed and cached, never reused. `Some(set)`
/// means incremental: a pointer absent from `set` is eligible to reuse its cache entry.
#[derive(Clone, Debug, Default)]
pub struct TransformRequest {
    pub changed_pointers: Option<HashSet<JsonPointer>>,
    pub group: Option<String>,
}

/// One transform applied to one snapshot.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TransformResult {
    pub transform: String,
    pub pointer: JsonPointer,
    pub output: serde_json::Value,
    pub input_fingerprint: String,
}

/// Runs selector-matched transforms over a token set, memoising per `(transform, pointer,
/// fingerprint)` key (§4.4).
pub struct TransformEngine {
    cache: Arc<dyn TransformCache>,
}

impl TransformEngine {
    pub fn new(cache: Arc<dyn TransformCache>) -> Self {
        Self { cache }
    }

    /// Executes `request` against every transform in `registry` and the given `snapshots`.
    /// Work is fanned out across a rayon thread pool, then sorted back into
    /// `(transform registration order, snapshot iteration order)` before returning — the
    /// degree of parallelism never changes observable output (§5).
    pub fn execute(
        &self,
        registry: &TransformRegistry,
        snapshots: &TokenSet,
        request: &TransformRequest,
    ) -> Vec<TransformResult> {
        let applicable: Vec<(usize, &TransformDefinition)> = registry
            .iter()
            .enumerate()
            .filter(|(_, def)| group_matches(def, request.group.as_deref()))
            .collect();

        let ordered_snapshots: Vec<(usize, &TokenSnapshot)> = snapshots.iter().enumerate().collect();

        let mut pairs: Vec<(usize, usize, &TransformDefinition, &TokenSnapshot)> = Vec::new();
        for &(t_idx, def) in &applicable {
            for &(s_idx, snapshot) in &ordered_snapshots {
                if def.selector.matches(snapshot) {
                    pairs.push((t_idx, s_idx, def, snapshot));
                }
            }
        }

        let mut computed: Vec<(usize, usize, Option<TransformResult>)> = pairs
            .into_par_iter()
            .map(|(t_idx, s_idx, def, snapshot)| {
                (t_idx, s_idx, self.run_one(def, snapshot, request))
            })
            .collect();

        computed.sort_by_key(|(t_idx, s_idx, _)| (*t_idx, *s_idx));
        computed.into_iter().filter_map(|(_, _, result)| result).collect()
    }

    fn run_one(
        &self,
        definition: &TransformDefinition,
        snapshot: &TokenSnapshot,
        request: &TransformRequest,
    ) -> Option<TransformResult> {
        let fingerprint = input_fingerprint(&definition.name, snapshot, &definition.options);

        let eligible_for_reuse = match &request.changed_pointers {
            Some(changed) => !changed.contains(&snapshot.pointer),
            None => false,
        };

        let output = if eligible_for_reuse {
            if let Some(entry) = self.cache.get(&fingerprint) {
                Some(entry.value)
            } else {
                self.run_and_cache(definition, snapshot, &fingerprint)
            }
        } else {
            self.run_and_cache(definition, snapshot, &fingerprint)
        };

        output.map(|value| TransformResult {
            transform: definition.name.clone(),
            pointer: snapshot.pointer.clone(),
            output: value,
            input_fingerprint: fingerprint,
        })
    }

    fn run_and_cache(
        &self,
        definition: &TransformDefinition,
        snapshot: &TokenSnapshot,
        fingerprint: &str,
    ) -> Option<serde_json::Value> {
        let input = TransformInput {
            snapshot,
            options: &definition.options,
        };
        let value = definition.run(&input)?;
        self.cache.set(
            fingerprint,
            CacheEntry {
                key: fingerprint.to_string(),
                value: value.clone(),
                written_at: now_iso8601(),
                metadata: None,
            },
        );
        Some(value)
    }
}

fn group_matches(definition: &TransformDefinition, requested: Option<&str>) -> bool {
    match (requested, &definition.group) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(requested), Some(group)) => normalize_group(group) == normalize_group(requested),
    }
}

fn input_fingerprint(
    transform_name: &str,
    snapshot: &TokenSnapshot,
    options: &serde_json::Value,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(transform_name.as_bytes());
    hasher.update(b"|");
    hasher.update(snapshot.pointer.as_str().as_bytes());
    hasher.update(b"|");
    if let Some(value) = snapshot.effective_value() {
        hasher.update(canonicalize(value).as_bytes());
    }
    hasher.update(b"|");
    hasher.update(canonicalize(options).as_bytes());
    hex::encode(hasher.finalize())
}

/// The cache entry's `writtenAt` is advisory metadata, not a value anything compares against
/// for correctness.
fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::cache::InMemoryTransformCache;
    use crate::transform::definition::TransformDefinition;
    use crate::transform::selector::Selector;
    use crate::token::{Provenance, Token, TokenType};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

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
    fn cache_hit_avoids_recomputation_until_pointer_changes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let mut registry = TransformRegistry::new();
        registry.register(TransformDefinition::new("double", Selector::any(), move |input: &TransformInput| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let value = input.snapshot.effective_value()?.as_f64()?;
            Some(json!({ "value": value * 2.0 }))
        }));

        let mut set = TokenSet::new();
        set.insert(snapshot("/p", json!(4)));

        let cache = Arc::new(InMemoryTransformCache::new());
        let engine = TransformEngine::new(cache);

        let pointer = JsonPointer::parse("/p");

        // First run: pointer is in changedPointers, so it must run.
        let request_one = TransformRequest {
            changed_pointers: Some(HashSet::from([pointer.clone()])),
            group: None,
        };
        let result_one = engine.execute(&registry, &set, &request_one);
        assert_eq!(result_one.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second run: changedPointers is the empty set (supplied, but excludes the pointer)
        // so the cache entry is reused.
        let request_two = TransformRequest {
            changed_pointers: Some(HashSet::new()),
            group: None,
        };
        let result_two = engine.execute(&registry, &set, &request_two);
        assert_eq!(result_two.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Third run: pointer is changed again, so the transform reruns.
        let result_three = engine.execute(&registry, &set, &request_one);
        assert_eq!(result_three.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn undefined_output_emits_no_result() {
        let mut registry = TransformRegistry::new();
        registry.register(TransformDefinition::new(
            "never",
            Selector::any(),
            |_: &TransformInput| None,
        ));
        let mut set = TokenSet::new();
        set.insert(snapshot("/p", json!(4)));

        let engine = TransformEngine::new(Arc::new(InMemoryTransformCache::new()));
        let results = engine.execute(&registry, &set, &TransformRequest::default());
        assert!(results.is_empty());
    }

    #[test]
    fn results_are_ordered_by_registration_then_snapshot_order() {
        let mut registry = TransformRegistry::new();
        registry.register(TransformDefinition::new("a", Selector::any(), |i: &TransformInput| {
            i.snapshot.effective_value().cloned()
        }));
        registry.register(TransformDefinition::new("b", Selector::any(), |i: &TransformInput| {
            i.snapshot.effective_value().cloned()
        }));

        let mut set = TokenSet::new();
        set.insert(snapshot("/z", json!(1)));
        set.insert(snapshot("/a", json!(2)));

        let engine = TransformEngine::new(Arc::new(InMemoryTransformCache::new()));
        let results = engine.execute(&registry, &set, &TransformRequest::default());

        let order: Vec<_> = results
            .iter()
            .map(|r| (r.transform.clone(), r.pointer.as_str().to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), "/z".to_string()),
                ("a".to_string(), "/a".to_string()),
                ("b".to_string(), "/z".to_string()),
                ("b".to_string(), "/a".to_string()),
            ]
        );
    }

    #[test]
    fn group_filter_selects_matching_transforms_only() {
        let mut registry = TransformRegistry::new();
        registry.register(
            TransformDefinition::new("a", Selector::any(), |_: &TransformInput| Some(json!(1)))
                .with_group("core"),
        );
        registry.register(
            TransformDefinition::new("b", Selector::any(), |_: &TransformInput| Some(json!(2)))
                .with_group("ios"),
        );

        let mut set = TokenSet::new();
        set.insert(snapshot("/p", json!(1)));

        let engine = TransformEngine::new(Arc::new(InMemoryTransformCache::new()));
        let request = TransformRequest {
            changed_pointers: None,
            group: Some("web/base".to_string()),
        };
        let results = engine.execute(&registry, &set, &request);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].transform, "a");
    }
}
