use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::dependency::{DependencyDiff, DependencyStore, DependencySnapshot};
use crate::diagnostics::Diagnostic;
use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventBus, PipelineStage, StageEvent};
use crate::formatter::{
    ExecutionContext, ArtifactWriter, FormatterExecutionResult, FormatterExecutor,
    FormatterFactoryRegistry, FormatterPlanner,
};
use crate::planner::SourcePlanner;
use crate::policy::{PolicyEngine, PolicyExecutionResult, PolicyRuleFactoryRegistry, PolicySummary};
use crate::resolver::{ResolveMetrics, Resolver};
use crate::token::TokenSet;
use crate::transform::{TransformEngine, TransformRegistry, TransformRequest, TransformResult};

/// Everything a completed build produced, stage by stage. A caller inspects this rather
/// than the individual component return values because several stages (dependency,
/// transform, policy) ran concurrently and only make sense read back together.
pub struct BuildOutcome {
    pub snapshots: TokenSet,
    pub resolve_metrics: ResolveMetrics,
    pub diagnostics: Vec<Diagnostic>,
    pub dependency_diff: DependencyDiff,
    pub transform_results: Vec<TransformResult>,
    pub formatter_results: Vec<FormatterExecutionResult>,
    pub written_artifacts: BTreeMap<String, Vec<PathBuf>>,
    pub policy_results: Vec<PolicyExecutionResult>,
    pub policy_summary: PolicySummary,
}

/// Ties the independently-testable components together into the control flow described in
/// the system overview: *Planner → Resolver → Dependency Tracker → Transform Engine →
/// Formatter Orchestrator → Artifact Writer*, with the Policy Engine running concurrently
/// over the resolved snapshots (§2). The Diff Engine is not part of this flow — it compares
/// two already-built token sets and is invoked standalone (see [`crate::diff::DiffEngine`]).
pub struct PipelineSession {
    planner: SourcePlanner,
    resolver: Resolver,
    dependency_store: Arc<dyn DependencyStore>,
    transform_engine: TransformEngine,
    formatter_registry: FormatterFactoryRegistry,
    policy_registry: PolicyRuleFactoryRegistry,
    pub events: EventBus,
}

impl PipelineSession {
    pub fn new(
        dependency_store: Arc<dyn DependencyStore>,
        transform_engine: TransformEngine,
        formatter_registry: FormatterFactoryRegistry,
        policy_registry: PolicyRuleFactoryRegistry,
    ) -> Self {
        Self {
            planner: SourcePlanner::new(),
            resolver: Resolver::new(),
            dependency_store,
            transform_engine,
            formatter_registry,
            policy_registry,
            events: EventBus::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Runs a full build. `transforms` is supplied by the caller rather than read out of
    /// `config`, because transform `run` functions are Rust closures, not data a config
    /// file can describe (§4.9); `policy_context` is the ambient map policy handlers
    /// receive alongside each snapshot (e.g. `overrideApproved`).
    pub async fn build(
        &self,
        config: &PipelineConfig,
        transforms: &TransformRegistry,
        policy_context: &BTreeMap<String, JsonValue>,
        cancellation: &CancellationToken,
    ) -> PipelineResult<BuildOutcome> {
        self.events.publish(StageEvent::start(PipelineStage::Plan)).await;
        if cancellation.is_cancelled() {
            return self.cancel(PipelineStage::Plan).await;
        }
        let plan = match self.planner.plan(config) {
            Ok(plan) => plan,
            Err(err) => {
                self.events
                    .publish(StageEvent::error(PipelineStage::Plan, err.to_string()))
                    .await;
                return Err(err);
            }
        };
        self.events.publish(StageEvent::complete(PipelineStage::Plan)).await;

        self.events.publish(StageEvent::start(PipelineStage::Resolve)).await;
        if cancellation.is_cancelled() {
            return self.cancel(PipelineStage::Resolve).await;
        }
        let resolved = match self.resolver.resolve(&plan) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.events
                    .publish(StageEvent::error(PipelineStage::Resolve, err.to_string()))
                    .await;
                return Err(err);
            }
        };
        self.events.publish(StageEvent::complete(PipelineStage::Resolve)).await;

        let snapshots = resolved.merged_token_set();
        let mut diagnostics = resolved.diagnostics.clone();
        for entry in &resolved.entries {
            diagnostics.extend(entry.diagnostics.clone());
        }

        self.events.publish(StageEvent::start(PipelineStage::Dependency)).await;
        if cancellation.is_cancelled() {
            return self.cancel(PipelineStage::Dependency).await;
        }
        let dependency_snapshot = DependencySnapshot::from_resolved_plan(&resolved, now_iso8601());
        let dependency_diff = self
            .dependency_store
            .evaluate(&dependency_snapshot)
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "dependency store evaluate failed; treating as no prior state");
                DependencyDiff {
                    changed: dependency_snapshot
                        .entries
                        .iter()
                        .map(|e| e.pointer.clone())
                        .collect(),
                    removed: Default::default(),
                }
            });
        if let Err(err) = self.dependency_store.commit(&dependency_snapshot) {
            tracing::warn!(error = %err, "dependency store commit failed; next run will recompute fully");
        }
        self.events.publish(StageEvent::complete(PipelineStage::Dependency)).await;

        // Transform → Format → Write runs concurrently with the Policy Engine: both
        // consume the same resolved snapshots and neither depends on the other's output.
        let transform_request = TransformRequest {
            changed_pointers: Some(dependency_diff.changed.clone()),
            group: None,
        };

        let (build_side, policy_side) = tokio::join!(
            self.run_build_side(config, transforms, &snapshots, &transform_request, cancellation),
            self.run_policy_side(config, &snapshots, policy_context, cancellation),
        );

        let (transform_results, formatter_results, written_artifacts) = build_side?;
        let (policy_results, policy_summary) = policy_side?;

        Ok(BuildOutcome {
            snapshots,
            resolve_metrics: resolved.metrics,
            diagnostics,
            dependency_diff,
            transform_results,
            formatter_results,
            written_artifacts,
            policy_results,
            policy_summary,
        })
    }

    async fn run_build_side(
        &self,
        config: &PipelineConfig,
        transforms: &TransformRegistry,
        snapshots: &TokenSet,
        transform_request: &TransformRequest,
        cancellation: &CancellationToken,
    ) -> PipelineResult<(
        Vec<TransformResult>,
        Vec<FormatterExecutionResult>,
        BTreeMap<String, Vec<PathBuf>>,
    )> {
        self.events.publish(StageEvent::start(PipelineStage::Transform)).await;
        if cancellation.is_cancelled() {
            self.events
                .publish(StageEvent::error(PipelineStage::Transform, "cancelled"))
                .await;
            return Err(PipelineError::Cancelled("transform".to_string()));
        }
        let transform_results = self.transform_engine.execute(transforms, snapshots, transform_request);
        self.events.publish(StageEvent::complete(PipelineStage::Transform)).await;

        self.events.publish(StageEvent::start(PipelineStage::Format)).await;
        if cancellation.is_cancelled() {
            self.events
                .publish(StageEvent::error(PipelineStage::Format, "cancelled"))
                .await;
            return Err(PipelineError::Cancelled("format".to_string()));
        }
        let formatter_plans = FormatterPlanner::new(&self.formatter_registry)
            .plan(&config.formatters)
            .map_err(|err| err.context("planning formatters"))?;
        let execution_context = ExecutionContext::new(snapshots, &transform_results);
        let formatter_results = FormatterExecutor::execute(&formatter_plans, &execution_context);
        for result in &formatter_results {
            if let Some(diagnostic) = &result.diagnostic {
                tracing::warn!(formatter = %result.name, message = %diagnostic.message, "formatter execution failed");
            }
        }
        self.events.publish(StageEvent::complete(PipelineStage::Format)).await;

        self.events.publish(StageEvent::start(PipelineStage::Write)).await;
        if cancellation.is_cancelled() {
            self.events
                .publish(StageEvent::error(PipelineStage::Write, "cancelled"))
                .await;
            return Err(PipelineError::Cancelled("write".to_string()));
        }
        let output_directories: BTreeMap<String, PathBuf> = formatter_plans
            .iter()
            .filter_map(|plan| plan.output_directory.clone().map(|dir| (plan.id.clone(), dir)))
            .collect();
        let written_artifacts = match ArtifactWriter::write(
            &formatter_results,
            &output_directories,
            &config.default_out_dir,
        ) {
            Ok(written) => written,
            Err(err) => {
                self.events
                    .publish(StageEvent::error(PipelineStage::Write, err.to_string()))
                    .await;
                return Err(err);
            }
        };
        self.events.publish(StageEvent::complete(PipelineStage::Write)).await;

        Ok((transform_results, formatter_results, written_artifacts))
    }

    async fn run_policy_side(
        &self,
        config: &PipelineConfig,
        snapshots: &TokenSet,
        policy_context: &BTreeMap<String, JsonValue>,
        cancellation: &CancellationToken,
    ) -> PipelineResult<(Vec<PolicyExecutionResult>, PolicySummary)> {
        self.events.publish(StageEvent::start(PipelineStage::Policy)).await;
        if cancellation.is_cancelled() {
            self.events
                .publish(StageEvent::error(PipelineStage::Policy, "cancelled"))
                .await;
            return Err(PipelineError::Cancelled("policy".to_string()));
        }
        let policy_engine = PolicyEngine::new(&self.policy_registry);
        let results = match policy_engine.evaluate(&config.policies, snapshots, policy_context) {
            Ok(results) => results,
            Err(err) => {
                self.events
                    .publish(StageEvent::error(PipelineStage::Policy, err.to_string()))
                    .await;
                return Err(err);
            }
        };
        let summary = PolicySummary::build(&results);
        self.events.publish(StageEvent::complete(PipelineStage::Policy)).await;
        Ok((results, summary))
    }

    async fn cancel(&self, stage: PipelineStage) -> PipelineResult<BuildOutcome> {
        self.events
            .publish(StageEvent::error(stage, "cancelled before stage began"))
            .await;
        Err(PipelineError::Cancelled(stage.as_str().to_string()))
    }
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayerConfig, RepositoryConfig, SourceConfig, VirtualDocument};
    use crate::dependency::InMemoryDependencyStore;
    use crate::transform::InMemoryTransformCache;
    use serde_json::json;

    fn config_with_one_document() -> PipelineConfig {
        PipelineConfig {
            layers: vec![LayerConfig {
                name: "base".into(),
                context: BTreeMap::new(),
            }],
            sources: vec![SourceConfig {
                layer: "base".into(),
                repository: RepositoryConfig::Virtual {
                    documents: vec![VirtualDocument {
                        uri: "a.json".into(),
                        document: json!({ "color": { "primary": { "type": "color", "value": "#fff" } } }),
                        context: BTreeMap::new(),
                    }],
                },
                pointer_template: "{stem}".to_string(),
                context: BTreeMap::new(),
            }],
            formatters: vec![],
            policies: vec![],
            default_out_dir: std::env::temp_dir().join("tokenlayer-session-test"),
        }
    }

    #[tokio::test]
    async fn builds_without_formatters_or_policies() {
        let session = PipelineSession::new(
            Arc::new(InMemoryDependencyStore::new()),
            TransformEngine::new(Arc::new(InMemoryTransformCache::new())),
            FormatterFactoryRegistry::new(),
            PolicyRuleFactoryRegistry::new(),
        );

        let outcome = session
            .build(
                &config_with_one_document(),
                &TransformRegistry::new(),
                &BTreeMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.snapshots.len(), 1);
        assert!(outcome.transform_results.is_empty());
        assert!(outcome.formatter_results.is_empty());
        assert!(outcome.policy_results.is_empty());
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts_before_planning() {
        let session = PipelineSession::new(
            Arc::new(InMemoryDependencyStore::new()),
            TransformEngine::new(Arc::new(InMemoryTransformCache::new())),
            FormatterFactoryRegistry::new(),
            PolicyRuleFactoryRegistry::new(),
        );
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let err = session
            .build(
                &config_with_one_document(),
                &TransformRegistry::new(),
                &BTreeMap::new(),
                &cancellation,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled(_)));
    }
}
