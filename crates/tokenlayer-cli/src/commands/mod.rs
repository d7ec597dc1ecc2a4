use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tokenlayer_core::dependency::DependencyDiff;
use tokenlayer_core::diagnostics::Diagnostic;
use tokenlayer_core::diff::{DiffEntry, DiffSummary, Impact};
use tokenlayer_core::formatter::FormatterExecutionResult;
use tokenlayer_core::policy::{PolicyExecutionResult, PolicySummary};
use tokenlayer_core::resolver::ResolveMetrics;
use tokenlayer_core::transform::TransformResult;

use crate::error::ExitStatus;

pub mod build;
pub mod diff;
pub mod policy;

/// One classified diff entry paired with the impact its strategy assigned it, the shape
/// `DiffResult::entries` carries internally as a tuple (§4.6 step 3).
#[derive(Debug, Serialize)]
pub struct DiffEntryRecord {
    pub impact: Impact,
    #[serde(flatten)]
    pub entry: DiffEntry,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResult {
    Build {
        token_count: usize,
        resolve_metrics: ResolveMetrics,
        diagnostics: Vec<Diagnostic>,
        dependency_diff: DependencyDiff,
        transform_results: Vec<TransformResult>,
        formatter_results: Vec<FormatterExecutionResult>,
        written_artifacts: BTreeMap<String, Vec<PathBuf>>,
        policy_results: Vec<PolicyExecutionResult>,
        policy_summary: PolicySummary,
    },
    Diff {
        summary: DiffSummary,
        entries: Vec<DiffEntryRecord>,
    },
    Policy {
        results: Vec<PolicyExecutionResult>,
        summary: PolicySummary,
    },
}

impl CommandResult {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            CommandResult::Build { policy_summary, .. } => {
                if policy_summary.error > 0 {
                    ExitStatus::Data
                } else {
                    ExitStatus::Ok
                }
            }
            CommandResult::Policy { summary, .. } => {
                if summary.error > 0 {
                    ExitStatus::Data
                } else {
                    ExitStatus::Ok
                }
            }
            CommandResult::Diff { .. } => ExitStatus::Ok,
        }
    }
}
