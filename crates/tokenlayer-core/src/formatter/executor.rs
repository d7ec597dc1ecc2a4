use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::diagnostics::Diagnostic;
use crate::pointer::JsonPointer;
use crate::token::TokenSet;
use crate::transform::TransformResult;

use super::definition::{ArtifactContent, FileArtifact, FormatterToken};
use super::planner::FormatterPlan;

/// Shared, read-only context built once per run: every resolved snapshot plus every
/// transform output, indexed by pointer (§4.5 Executor).
pub struct ExecutionContext<'a> {
    snapshots: &'a TokenSet,
    transforms_by_pointer: BTreeMap<JsonPointer, BTreeMap<String, &'a JsonValue>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(snapshots: &'a TokenSet, transform_results: &'a [TransformResult]) -> Self {
        let mut transforms_by_pointer: BTreeMap<JsonPointer, BTreeMap<String, &'a JsonValue>> =
            BTreeMap::new();
        for result in transform_results {
            transforms_by_pointer
                .entry(result.pointer.clone())
                .or_default()
                .insert(result.transform.clone(), &result.output);
        }
        Self {
            snapshots,
            transforms_by_pointer,
        }
    }

    fn formatter_tokens(&self) -> Vec<FormatterToken<'a>> {
        self.snapshots
            .iter()
            .map(|snapshot| FormatterToken {
                snapshot,
                pointer: &snapshot.pointer,
                token_type: snapshot.token_type(),
                value: snapshot.effective_value(),
                transforms: self
                    .transforms_by_pointer
                    .get(&snapshot.pointer)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// Outcome of running one formatter plan: the enriched artifacts it produced, or a
/// diagnostic if the formatter panicked (§7: a formatter failure aborts only that
/// execution, never the overall build).
#[derive(Clone, Debug, Serialize)]
pub struct FormatterExecutionResult {
    pub execution_id: String,
    pub name: String,
    pub artifacts: Vec<FileArtifact>,
    pub diagnostic: Option<Diagnostic>,
}

/// Runs every planned formatter against the shared [`ExecutionContext`], matching its
/// selector against the token set and enriching each returned artifact's metadata with
/// `{ formatter, formatterInstance }` without mutating the formatter's own return value
/// (§4.5 Executor).
pub struct FormatterExecutor;

impl FormatterExecutor {
    pub fn execute(plans: &[FormatterPlan], context: &ExecutionContext) -> Vec<FormatterExecutionResult> {
        let all_tokens = context.formatter_tokens();

        plans
            .iter()
            .map(|plan| {
                let matched: Vec<FormatterToken> = all_tokens
                    .iter()
                    .filter(|token| plan.definition.selector.matches(token.snapshot))
                    .map(|token| FormatterToken {
                        snapshot: token.snapshot,
                        pointer: token.pointer,
                        token_type: token.token_type,
                        value: token.value,
                        transforms: token.transforms.clone(),
                    })
                    .collect();

                match catch_unwind(AssertUnwindSafe(|| plan.definition.run(&matched))) {
                    Ok(artifacts) => {
                        let enriched = artifacts
                            .into_iter()
                            .map(|artifact| enrich(artifact, &plan.name, &plan.id))
                            .collect();
                        FormatterExecutionResult {
                            execution_id: plan.id.clone(),
                            name: plan.name.clone(),
                            artifacts: enriched,
                            diagnostic: None,
                        }
                    }
                    Err(_) => FormatterExecutionResult {
                        execution_id: plan.id.clone(),
                        name: plan.name.clone(),
                        artifacts: Vec::new(),
                        diagnostic: Some(
                            Diagnostic::error(format!("formatter '{}' panicked", plan.name))
                                .with_scope(plan.id.clone())
                                .with_category("formatter"),
                        ),
                    },
                }
            })
            .collect()
    }
}

fn enrich(artifact: FileArtifact, formatter: &str, formatter_instance: &str) -> FileArtifact {
    let mut metadata = artifact.metadata;
    metadata.insert("formatter".to_string(), JsonValue::String(formatter.to_string()));
    metadata.insert(
        "formatterInstance".to_string(),
        JsonValue::String(formatter_instance.to_string()),
    );
    FileArtifact {
        path: artifact.path,
        content: artifact.content,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::definition::{FormatterDefinition, FormatterFactoryContext};
    use crate::formatter::planner::{FormatterPlan, FormatterPlanner};
    use crate::formatter::definition::FormatterFactoryRegistry;
    use crate::config::{FormatterInstanceConfig, FormatterOutputConfig};
    use crate::token::{Provenance, Token, TokenSnapshot, TokenType};
    use crate::transform::Selector;
    use serde_json::json;

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
            context: Default::default(),
        }
    }

    fn plans_with(registry: &FormatterFactoryRegistry) -> Vec<FormatterPlan> {
        FormatterPlanner::new(registry)
            .plan(&[FormatterInstanceConfig {
                name: "css".into(),
                options: json!(null),
                output: FormatterOutputConfig::default(),
            }])
            .unwrap()
    }

    #[test]
    fn artifacts_are_enriched_with_formatter_identity() {
        let mut registry = FormatterFactoryRegistry::new();
        registry.register("css", |_: &JsonValue, _: &FormatterFactoryContext| {
            FormatterDefinition::new("css", Selector::any(), |tokens: &[FormatterToken]| {
                vec![FileArtifact {
                    path: "out.css".into(),
                    content: ArtifactContent::Utf8 {
                        text: format!("{} rules", tokens.len()),
                    },
                    metadata: BTreeMap::new(),
                }]
            })
        });
        let plans = plans_with(&registry);

        let mut set = TokenSet::new();
        set.insert(snapshot("/color/primary"));
        let results: Vec<TransformResult> = Vec::new();
        let context = ExecutionContext::new(&set, &results);

        let executed = FormatterExecutor::execute(&plans, &context);
        assert_eq!(executed.len(), 1);
        let artifact = &executed[0].artifacts[0];
        assert_eq!(
            artifact.metadata.get("formatter"),
            Some(&JsonValue::String("css".into()))
        );
        assert_eq!(
            artifact.metadata.get("formatterInstance"),
            Some(&JsonValue::String("css#0".into()))
        );
    }

    #[test]
    fn panicking_formatter_becomes_a_diagnostic_not_an_abort() {
        let mut registry = FormatterFactoryRegistry::new();
        registry.register("css", |_: &JsonValue, _: &FormatterFactoryContext| {
            FormatterDefinition::new("css", Selector::any(), |_: &[FormatterToken]| {
                panic!("boom")
            })
        });
        let plans = plans_with(&registry);

        let mut set = TokenSet::new();
        set.insert(snapshot("/color/primary"));
        let results: Vec<TransformResult> = Vec::new();
        let context = ExecutionContext::new(&set, &results);

        let executed = FormatterExecutor::execute(&plans, &context);
        assert!(executed[0].artifacts.is_empty());
        assert!(executed[0].diagnostic.is_some());
    }
}
