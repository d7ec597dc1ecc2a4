use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::PolicyInstanceConfig;
use crate::error::PipelineError;
use crate::token::TokenSet;

use super::rule::{PolicyFactoryContext, PolicyInput, PolicyRuleFactoryRegistry};
use super::violation::{PolicyViolation, Severity};

/// The violations produced by one configured policy instance, over every snapshot
/// (§4.7: `PolicyExecutionResult[]`).
#[derive(Clone, Debug, Serialize)]
pub struct PolicyExecutionResult {
    pub rule: String,
    pub violations: Vec<PolicyViolation>,
}

/// Tally of violations by severity, clamped so a negative or non-finite contribution
/// (possible only if a custom handler hands back malformed counts through `details`)
/// never drives a tally below zero (§4.7).
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct PolicySummary {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl PolicySummary {
    pub fn build(results: &[PolicyExecutionResult]) -> Self {
        let mut summary = PolicySummary::default();
        for result in results {
            for violation in &result.violations {
                match violation.severity {
                    Severity::Error => summary.error = summary.error.saturating_add(1),
                    Severity::Warning => summary.warning = summary.warning.saturating_add(1),
                    Severity::Info => summary.info = summary.info.saturating_add(1),
                }
            }
        }
        summary
    }
}

/// Evaluates configured policy instances against a resolved token set, in registration
/// order, producing one [`PolicyExecutionResult`] per instance (§4.7).
pub struct PolicyEngine<'a> {
    registry: &'a PolicyRuleFactoryRegistry,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(registry: &'a PolicyRuleFactoryRegistry) -> Self {
        Self { registry }
    }

    pub fn evaluate(
        &self,
        instances: &[PolicyInstanceConfig],
        snapshots: &TokenSet,
        context: &BTreeMap<String, JsonValue>,
    ) -> Result<Vec<PolicyExecutionResult>, PipelineError> {
        instances
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                let factory = self
                    .registry
                    .get(&instance.name)
                    .ok_or_else(|| PipelineError::MissingRuleFactory(instance.name.clone()))?;
                let factory_context = PolicyFactoryContext {
                    instance_index: index,
                };
                let rule = factory.create(&instance.options, &factory_context);
                let handler = rule.setup(&instance.options);

                let mut violations = Vec::new();
                for snapshot in snapshots.iter() {
                    let input = PolicyInput { snapshot, context };
                    match catch_unwind(AssertUnwindSafe(|| handler.handle(&input))) {
                        Ok(produced) => violations.extend(produced),
                        Err(_) => violations.push(PolicyViolation {
                            policy: rule.name.clone(),
                            pointer: snapshot.pointer.clone(),
                            severity: Severity::Error,
                            message: format!("rule '{}' panicked", rule.name),
                            details: None,
                        }),
                    }
                }

                Ok(PolicyExecutionResult {
                    rule: rule.name.clone(),
                    violations,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::JsonPointer;
    use crate::policy::rule::{PolicyHandler, PolicyRule};
    use crate::token::{Provenance, Token, TokenSnapshot, TokenType};
    use serde_json::json;
    use std::sync::Arc;

    fn snapshot(pointer: &str) -> TokenSnapshot {
        TokenSnapshot {
            pointer: JsonPointer::parse(pointer),
            source_pointer: None,
            token: Token {
                id: pointer.to_string(),
                token_type: Some(TokenType::Color),
                value: Some(json!("#000000")),
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
    fn missing_factory_is_a_named_error() {
        let registry = PolicyRuleFactoryRegistry::new();
        let engine = PolicyEngine::new(&registry);
        let set = TokenSet::new();
        let err = engine
            .evaluate(
                &[PolicyInstanceConfig {
                    name: "missing-rule".into(),
                    options: json!(null),
                }],
                &set,
                &BTreeMap::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingRuleFactory(name) if name == "missing-rule"));
    }

    #[test]
    fn panicking_handler_becomes_an_error_violation() {
        let mut registry = PolicyRuleFactoryRegistry::new();
        registry.register("boom", |_: &JsonValue, _: &PolicyFactoryContext| {
            PolicyRule::new("boom", |_: &JsonValue| {
                Arc::new(|_input: &PolicyInput| -> Vec<PolicyViolation> { panic!("rule exploded") })
                    as Arc<dyn PolicyHandler>
            })
        });

        let engine = PolicyEngine::new(&registry);
        let mut set = TokenSet::new();
        set.insert(snapshot("/a"));

        let results = engine
            .evaluate(
                &[PolicyInstanceConfig {
                    name: "boom".into(),
                    options: json!(null),
                }],
                &set,
                &BTreeMap::new(),
            )
            .unwrap();
        assert_eq!(results[0].violations.len(), 1);
        assert_eq!(results[0].violations[0].severity, Severity::Error);
        let summary = PolicySummary::build(&results);
        assert_eq!(summary.error, 1);
    }
}
