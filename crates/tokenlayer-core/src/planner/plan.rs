use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::config::{PipelineConfig, RepositoryConfig};
use crate::diagnostics::Diagnostic;
use crate::error::PipelineError;
use crate::pointer::JsonPointer;

use super::pointer_template::{resolve_pointer_template, PointerTemplateContext};
use super::repository::{
    DiscoverContext, FileGlobRepository, RepositoryIssue, SourceRepository, VirtualRepository,
};

/// Schema Validator port (§6): `validate(document, context) → issues?`.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, document: &JsonValue, context: &PlanContext) -> Option<Vec<ValidationIssue>>;
}

#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub message: String,
}

/// Context available while validating a single discovered document.
#[derive(Clone, Debug)]
pub struct PlanContext {
    pub layer: String,
    pub uri: String,
}

/// One planned, parsed document, ordered and ready for the resolver.
#[derive(Clone, Debug)]
pub struct PlanEntry {
    pub source_id: String,
    pub layer: String,
    pub layer_index: usize,
    pub uri: String,
    pub document: JsonValue,
    pub pointer_prefix: JsonPointer,
    pub context: BTreeMap<String, JsonValue>,
}

/// The result of planning: every successfully loaded document plus the collected issue
/// list. Only `UnknownLayer` and pointer-template errors are fatal (§4.1).
#[derive(Clone, Debug, Default)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves `{ layers, sources }` configuration into an ordered plan of parsed documents.
pub struct SourcePlanner {
    validator: Option<Arc<dyn SchemaValidator>>,
}

impl SourcePlanner {
    pub fn new() -> Self {
        Self { validator: None }
    }

    pub fn with_validator(validator: Arc<dyn SchemaValidator>) -> Self {
        Self {
            validator: Some(validator),
        }
    }

    pub fn plan(&self, config: &PipelineConfig) -> Result<Plan, PipelineError> {
        let layer_index_by_name: BTreeMap<&str, usize> = config
            .layers
            .iter()
            .enumerate()
            .map(|(idx, layer)| (layer.name.as_str(), idx))
            .collect();

        let mut entries = Vec::new();
        let mut diagnostics = Vec::new();

        for (source_index, source) in config.sources.iter().enumerate() {
            let Some(&layer_index) = layer_index_by_name.get(source.layer.as_str()) else {
                return Err(PipelineError::UnknownLayer(source.layer.clone()));
            };
            let layer = &config.layers[layer_index];

            let outcome = self.discover(source, source_index);
            for issue in outcome.issues {
                diagnostics.push(repository_issue_to_diagnostic(&source.layer, issue));
            }

            let source_id = format!("{}#{source_index}", source.layer);
            for document in outcome.documents {
                let template_context = PointerTemplateContext {
                    relative: Some(document.uri.clone()),
                    basename: basename_of(&document.uri),
                    stem: stem_of(&document.uri),
                    source: Some(source_id.clone()),
                };
                let pointer_prefix =
                    resolve_pointer_template(&source.pointer_template, &template_context)?;

                if let Some(validator) = &self.validator {
                    let plan_context = PlanContext {
                        layer: source.layer.clone(),
                        uri: document.uri.clone(),
                    };
                    if let Some(issues) = validator.validate(&document.document, &plan_context) {
                        for issue in issues {
                            diagnostics.push(
                                Diagnostic::error(issue.message)
                                    .with_scope(source.layer.clone())
                                    .with_category("schema"),
                            );
                        }
                    }
                }

                let mut context = layer.context.clone();
                context.extend(source.context.clone());
                context.extend(document.context.clone());

                entries.push(PlanEntry {
                    source_id: source_id.clone(),
                    layer: source.layer.clone(),
                    layer_index,
                    uri: document.uri,
                    document: document.document,
                    pointer_prefix,
                    context,
                });
            }
        }

        entries.sort_by(|a, b| {
            a.layer_index
                .cmp(&b.layer_index)
                .then_with(|| a.pointer_prefix.cmp(&b.pointer_prefix))
                .then_with(|| a.uri.cmp(&b.uri))
        });

        Ok(Plan {
            entries,
            diagnostics,
        })
    }

    fn discover(
        &self,
        source: &crate::config::SourceConfig,
        source_index: usize,
    ) -> super::repository::DiscoverOutcome {
        let context = DiscoverContext {
            layer: source.layer.clone(),
            source_index,
        };
        match &source.repository {
            RepositoryConfig::FileGlob { .. } => {
                match FileGlobRepository::from_config(&source.repository) {
                    Some(repo) => repo.discover(&context),
                    None => Default::default(),
                }
            }
            RepositoryConfig::Virtual { .. } => {
                match VirtualRepository::from_config(&source.repository) {
                    Some(repo) => repo.discover(&context),
                    None => Default::default(),
                }
            }
        }
    }
}

impl Default for SourcePlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn repository_issue_to_diagnostic(layer: &str, issue: RepositoryIssue) -> Diagnostic {
    let mut diagnostic = Diagnostic::warn(issue.message)
        .with_scope(layer.to_string())
        .with_category("source");
    if let Some(uri) = issue.uri {
        diagnostic = diagnostic.with_code(uri);
    }
    diagnostic
}

fn basename_of(uri: &str) -> Option<String> {
    uri.rsplit('/').next().map(|s| s.to_string())
}

fn stem_of(uri: &str) -> Option<String> {
    basename_of(uri).map(|basename| match basename.rsplit_once('.') {
        Some((stem, _ext)) => stem.to_string(),
        None => basename,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayerConfig, SourceConfig, VirtualDocument};

    fn virtual_source(layer: &str, uris: &[&str]) -> SourceConfig {
        SourceConfig {
            layer: layer.to_string(),
            repository: RepositoryConfig::Virtual {
                documents: uris
                    .iter()
                    .map(|uri| VirtualDocument {
                        uri: uri.to_string(),
                        document: JsonValue::Object(Default::default()),
                        context: BTreeMap::new(),
                    })
                    .collect(),
            },
            pointer_template: "{stem}".to_string(),
            context: BTreeMap::new(),
        }
    }

    #[test]
    fn unknown_layer_is_fatal() {
        let config = PipelineConfig {
            layers: vec![],
            sources: vec![virtual_source("missing", &["a.json"])],
            formatters: vec![],
            policies: vec![],
            default_out_dir: Default::default(),
        };
        let planner = SourcePlanner::new();
        assert!(matches!(
            planner.plan(&config),
            Err(PipelineError::UnknownLayer(_))
        ));
    }

    #[test]
    fn plan_is_sorted_by_layer_index_then_pointer_then_uri() {
        let config = PipelineConfig {
            layers: vec![
                LayerConfig {
                    name: "base".into(),
                    context: BTreeMap::new(),
                },
                LayerConfig {
                    name: "brand".into(),
                    context: BTreeMap::new(),
                },
            ],
            sources: vec![
                virtual_source("brand", &["z.json", "a.json"]),
                virtual_source("base", &["b.json"]),
            ],
            formatters: vec![],
            policies: vec![],
            default_out_dir: Default::default(),
        };
        let planner = SourcePlanner::new();
        let plan = planner.plan(&config).unwrap();
        let uris: Vec<_> = plan.entries.iter().map(|e| e.uri.clone()).collect();
        assert_eq!(uris, vec!["b.json", "a.json", "z.json"]);
    }

    #[test]
    fn context_merges_layer_then_source_then_document() {
        let mut source = virtual_source("base", &[]);
        source.repository = RepositoryConfig::Virtual {
            documents: vec![VirtualDocument {
                uri: "a.json".into(),
                document: JsonValue::Object(Default::default()),
                context: BTreeMap::from([("k".to_string(), JsonValue::String("doc".into()))]),
            }],
        };
        source.context = BTreeMap::from([("k".to_string(), JsonValue::String("source".into()))]);

        let config = PipelineConfig {
            layers: vec![LayerConfig {
                name: "base".into(),
                context: BTreeMap::from([("k".to_string(), JsonValue::String("layer".into()))]),
            }],
            sources: vec![source],
            formatters: vec![],
            policies: vec![],
            default_out_dir: Default::default(),
        };

        let planner = SourcePlanner::new();
        let plan = planner.plan(&config).unwrap();
        assert_eq!(
            plan.entries[0].context.get("k"),
            Some(&JsonValue::String("doc".into()))
        );
    }
}
