mod cache;
mod parse;

pub use cache::{document_fingerprint, CacheStatus, DocumentCache, InMemoryResolverCache, TokenCache};
pub use parse::{flatten_document, RawToken};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::diagnostics::Diagnostic;
use crate::error::PipelineResult;
use crate::planner::{Plan, PlanEntry};
use crate::pointer::JsonPointer;
use crate::token::{Provenance, ResolvedReference, Token, TokenMetadata, TokenResolution, TokenSet, TokenSnapshot};

/// The flattened, unresolved view of every pointer across every planned source, used as the
/// target space for alias chasing. A later entry's token overrides an earlier one at the same
/// pointer, mirroring the token set's own override rule.
struct GlobalEntry {
    token: Token,
    metadata: Option<TokenMetadata>,
    source_pointer: JsonPointer,
}

/// One planned source after parsing and alias resolution.
#[derive(Clone, Debug)]
pub struct ResolvedSource {
    pub source_id: String,
    pub layer: String,
    pub layer_index: usize,
    pub uri: String,
    pub tokens: Vec<TokenSnapshot>,
    pub diagnostics: Vec<Diagnostic>,
    pub cache_status: CacheStatus,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct ResolveMetrics {
    pub entry_count: usize,
    pub total_ms: u128,
    pub parse_ms: u128,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_skipped: usize,
}

/// The full result of resolving a plan: one [`ResolvedSource`] per planned entry, plan-level
/// diagnostics, and run metrics.
#[derive(Clone, Debug)]
pub struct ResolvedPlan {
    pub entries: Vec<ResolvedSource>,
    pub diagnostics: Vec<Diagnostic>,
    pub metrics: ResolveMetrics,
}

impl ResolvedPlan {
    /// Folds every source's snapshots into a single [`TokenSet`], in plan order, so later
    /// layers override earlier ones at the same pointer.
    pub fn merged_token_set(&self) -> TokenSet {
        self.entries
            .iter()
            .flat_map(|entry| entry.tokens.iter().cloned())
            .collect()
    }
}

/// Parses planned documents into flattened, alias-resolved token snapshots.
pub struct Resolver {
    document_cache: Option<Arc<dyn DocumentCache>>,
    token_cache: Option<Arc<dyn TokenCache>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            document_cache: None,
            token_cache: None,
        }
    }

    pub fn with_caches(
        document_cache: Arc<dyn DocumentCache>,
        token_cache: Arc<dyn TokenCache>,
    ) -> Self {
        Self {
            document_cache: Some(document_cache),
            token_cache: Some(token_cache),
        }
    }

    pub fn resolve(&self, plan: &Plan) -> PipelineResult<ResolvedPlan> {
        let total_start = Instant::now();
        let mut parse_ms = 0u128;
        let mut cache_hits = 0usize;
        let mut cache_misses = 0usize;
        let mut cache_skipped = 0usize;

        // Phase one: flatten every entry, reusing cached snapshots where the document
        // fingerprint is unchanged, and assemble the cross-source alias target space.
        enum EntryWork {
            Cached(Vec<TokenSnapshot>),
            Fresh(Vec<RawToken>),
        }

        let mut work: Vec<EntryWork> = Vec::with_capacity(plan.entries.len());
        let mut statuses: Vec<CacheStatus> = Vec::with_capacity(plan.entries.len());
        let mut global: BTreeMap<JsonPointer, GlobalEntry> = BTreeMap::new();

        for entry in &plan.entries {
            let cache_key = format!("{}::{}", entry.source_id, entry.uri);

            let (status, cached) = match (&self.document_cache, &self.token_cache) {
                (Some(doc_cache), Some(tok_cache)) => {
                    let fingerprint = document_fingerprint(&entry.document);
                    match (
                        doc_cache.get_fingerprint(&cache_key),
                        tok_cache.get_tokens(&cache_key),
                    ) {
                        (Some(prev), Some(bytes)) if prev == fingerprint => {
                            match serde_json::from_slice::<Vec<TokenSnapshot>>(&bytes) {
                                Ok(snapshots) => (CacheStatus::Hit, Some(snapshots)),
                                Err(_) => (CacheStatus::Miss, None),
                            }
                        }
                        _ => (CacheStatus::Miss, None),
                    }
                }
                _ => (CacheStatus::Skip, None),
            };

            match status {
                CacheStatus::Hit => cache_hits += 1,
                CacheStatus::Miss => cache_misses += 1,
                CacheStatus::Skip => cache_skipped += 1,
            }
            statuses.push(status);

            match cached {
                Some(snapshots) => {
                    for snapshot in &snapshots {
                        global.insert(
                            snapshot.pointer.clone(),
                            GlobalEntry {
                                token: snapshot.token.clone(),
                                metadata: snapshot.metadata.clone(),
                                source_pointer: snapshot
                                    .source_pointer
                                    .clone()
                                    .unwrap_or_else(JsonPointer::root),
                            },
                        );
                    }
                    work.push(EntryWork::Cached(snapshots));
                }
                None => {
                    let parse_start = Instant::now();
                    let raw_tokens = flatten_document(&entry.document, &entry.pointer_prefix);
                    parse_ms += parse_start.elapsed().as_millis();

                    for raw in &raw_tokens {
                        global.insert(
                            raw.pointer.clone(),
                            GlobalEntry {
                                token: raw.token.clone(),
                                metadata: raw.metadata.clone(),
                                source_pointer: raw.source_pointer.clone(),
                            },
                        );
                    }
                    work.push(EntryWork::Fresh(raw_tokens));
                }
            }
        }

        // Phase two: resolve aliases against the assembled global map and emit snapshots,
        // writing fresh cache entries for anything that missed.
        let mut entries = Vec::with_capacity(plan.entries.len());

        for (entry, (status, item)) in plan
            .entries
            .iter()
            .zip(statuses.into_iter().zip(work.into_iter()))
        {
            let (tokens, diagnostics) = match item {
                EntryWork::Cached(snapshots) => (snapshots, Vec::new()),
                EntryWork::Fresh(raw_tokens) => {
                    let provenance = provenance_for(entry);
                    let mut tokens = Vec::with_capacity(raw_tokens.len());
                    let mut diagnostics = Vec::new();

                    for raw in raw_tokens {
                        let (resolution, diagnostic) = if raw.token.is_alias() {
                            match resolve_alias_chain(
                                raw.token.reference.as_ref().unwrap(),
                                &global,
                            ) {
                                Ok(resolution) => (Some(resolution), None),
                                Err(message) => (
                                    None,
                                    Some(
                                        Diagnostic::error(message)
                                            .with_pointer(raw.pointer.clone())
                                            .with_category("resolution"),
                                    ),
                                ),
                            }
                        } else {
                            (None, None)
                        };

                        if let Some(diagnostic) = diagnostic {
                            diagnostics.push(diagnostic);
                        }

                        tokens.push(TokenSnapshot {
                            pointer: raw.pointer,
                            source_pointer: Some(raw.source_pointer),
                            token: raw.token,
                            metadata: raw.metadata,
                            resolution,
                            provenance: provenance.clone(),
                            context: entry.context.clone(),
                        });
                    }

                    if let (Some(doc_cache), Some(tok_cache)) =
                        (&self.document_cache, &self.token_cache)
                    {
                        let cache_key = format!("{}::{}", entry.source_id, entry.uri);
                        let fingerprint = document_fingerprint(&entry.document);
                        if let Ok(bytes) = serde_json::to_vec(&tokens) {
                            doc_cache.put_fingerprint(&cache_key, fingerprint);
                            tok_cache.put_tokens(&cache_key, bytes);
                        }
                    }

                    (tokens, diagnostics)
                }
            };

            entries.push(ResolvedSource {
                source_id: entry.source_id.clone(),
                layer: entry.layer.clone(),
                layer_index: entry.layer_index,
                uri: entry.uri.clone(),
                tokens,
                diagnostics,
                cache_status: status,
            });
        }

        Ok(ResolvedPlan {
            diagnostics: plan.diagnostics.clone(),
            metrics: ResolveMetrics {
                entry_count: plan.entries.len(),
                total_ms: total_start.elapsed().as_millis(),
                parse_ms,
                cache_hits,
                cache_misses,
                cache_skipped,
            },
            entries,
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

fn provenance_for(entry: &PlanEntry) -> Provenance {
    Provenance {
        source_id: entry.source_id.clone(),
        layer: entry.layer.clone(),
        layer_index: entry.layer_index,
        uri: entry.uri.clone(),
        pointer_prefix: entry.pointer_prefix.clone(),
    }
}

fn resolve_alias_chain(
    start: &crate::token::TokenRef,
    global: &BTreeMap<JsonPointer, GlobalEntry>,
) -> Result<TokenResolution, String> {
    let mut visited = HashSet::new();
    let mut references = Vec::new();
    let mut resolution_path = Vec::new();
    let mut applied_aliases = Vec::new();
    let mut current = start.clone();

    loop {
        if !visited.insert(current.pointer.clone()) {
            return Err(format!("alias cycle detected at {}", current.pointer));
        }
        references.push(ResolvedReference {
            pointer: current.pointer.clone(),
            uri: current.uri.clone(),
        });
        resolution_path.push(current.pointer.clone());

        let Some(target) = global.get(&current.pointer) else {
            return Err(format!("unresolved reference to {}", current.pointer));
        };

        if target.token.is_alias() {
            applied_aliases.push(current.pointer.clone());
            current = target.token.reference.clone().unwrap();
            continue;
        }

        let value: Option<JsonValue> = target
            .token
            .value
            .clone()
            .or_else(|| target.token.raw.clone());
        let Some(value) = value else {
            return Err(format!(
                "reference target {} has neither value nor raw",
                current.pointer
            ));
        };

        return Ok(TokenResolution {
            references,
            resolution_path,
            applied_aliases,
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayerConfig, PipelineConfig, RepositoryConfig, SourceConfig, VirtualDocument};
    use crate::planner::SourcePlanner;
    use serde_json::json;

    fn plan_for(documents: Vec<(&str, JsonValue)>) -> Plan {
        let config = PipelineConfig {
            layers: vec![LayerConfig {
                name: "base".into(),
                context: BTreeMap::new(),
            }],
            sources: vec![SourceConfig {
                layer: "base".into(),
                repository: RepositoryConfig::Virtual {
                    documents: documents
                        .into_iter()
                        .map(|(uri, document)| VirtualDocument {
                            uri: uri.to_string(),
                            document,
                            context: BTreeMap::new(),
                        })
                        .collect(),
                },
                pointer_template: "{stem}".to_string(),
                context: BTreeMap::new(),
            }],
            formatters: vec![],
            policies: vec![],
            default_out_dir: Default::default(),
        };
        SourcePlanner::new().plan(&config).unwrap()
    }

    #[test]
    fn resolves_same_document_alias_chain() {
        let plan = plan_for(vec![(
            "a.json",
            json!({
                "color": {
                    "brand": { "type": "color", "value": "#ff0000" },
                    "alias": { "ref": "#/a/color/brand" }
                }
            }),
        )]);
        let resolved = Resolver::new().resolve(&plan).unwrap();
        let merged = resolved.merged_token_set();
        let snapshot = merged.get(&JsonPointer::parse("/a/color/alias")).unwrap();
        assert_eq!(
            snapshot.effective_value(),
            Some(&JsonValue::String("#ff0000".into()))
        );
        let resolution = snapshot.resolution.as_ref().unwrap();
        assert_eq!(resolution.resolution_path.len(), 1);
        assert!(resolution.applied_aliases.is_empty());
    }

    #[test]
    fn cycle_is_attached_to_originating_snapshot_without_aborting_plan() {
        let plan = plan_for(vec![(
            "a.json",
            json!({
                "x": { "ref": "#/a/y" },
                "y": { "ref": "#/a/x" }
            }),
        )]);
        let resolved = Resolver::new().resolve(&plan).unwrap();
        let merged = resolved.merged_token_set();
        assert_eq!(merged.len(), 2);
        let diagnostics = &resolved.entries[0].diagnostics;
        assert_eq!(diagnostics.len(), 2);
        let x_snapshot = merged.get(&JsonPointer::parse("/a/x")).unwrap();
        assert!(x_snapshot.resolution.is_none());
    }

    #[test]
    fn cache_hit_on_unchanged_document_skips_reparsing() {
        let plan = plan_for(vec![(
            "a.json",
            json!({ "primary": { "type": "color", "value": "#fff" } }),
        )]);
        let cache = Arc::new(InMemoryResolverCache::new());
        let resolver = Resolver::with_caches(cache.clone(), cache.clone());

        let first = resolver.resolve(&plan).unwrap();
        assert_eq!(first.entries[0].cache_status, CacheStatus::Miss);

        let second = resolver.resolve(&plan).unwrap();
        assert_eq!(second.entries[0].cache_status, CacheStatus::Hit);
        assert_eq!(
            first.merged_token_set().get(&JsonPointer::parse("/a/primary")),
            second.merged_token_set().get(&JsonPointer::parse("/a/primary"))
        );
    }

    #[test]
    fn no_caches_configured_reports_skip() {
        let plan = plan_for(vec![("a.json", json!({ "x": { "value": 1 } }))]);
        let resolved = Resolver::new().resolve(&plan).unwrap();
        assert_eq!(resolved.entries[0].cache_status, CacheStatus::Skip);
        assert_eq!(resolved.metrics.cache_skipped, 1);
    }
}
