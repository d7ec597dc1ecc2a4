use std::process::ExitCode;

use serde_json::json;
use tokenlayer_core::diff::{DiffEntry, RecommendedBump};

use crate::commands::CommandResult;
use crate::error::CliError;

pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a `CommandResult` as either human-readable text or pretty JSON, converting the
/// outcome into a deterministic exit code along the way.
pub fn emit_result(result: CommandResult, format: OutputFormat) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => print_text(&result),
        OutputFormat::Json => print_json(&result)?,
    };
    Ok(ExitCode::from(result.exit_status().code()))
}

fn print_text(result: &CommandResult) {
    match result {
        CommandResult::Build {
            token_count,
            dependency_diff,
            transform_results,
            formatter_results,
            written_artifacts,
            policy_summary,
            diagnostics,
            ..
        } => {
            println!(
                "Build complete: {token_count} token(s), {} changed / {} removed dependency pointer(s)",
                dependency_diff.changed.len(),
                dependency_diff.removed.len(),
            );
            println!(
                "  {} transform result(s), {} formatter(s) run",
                transform_results.len(),
                formatter_results.len()
            );
            for (id, paths) in written_artifacts {
                println!("  {id}: {} artifact(s) written", paths.len());
            }
            println!(
                "  policy: {} error(s), {} warning(s), {} info",
                policy_summary.error, policy_summary.warning, policy_summary.info
            );
            for diagnostic in diagnostics {
                println!("  diagnostic: {}", diagnostic.message);
            }
        }
        CommandResult::Diff { summary, entries } => {
            println!(
                "Diff: {} entr(y/ies), recommended bump: {}",
                entries.len(),
                describe_bump(summary.recommended_bump)
            );
            println!(
                "  {} breaking, {} non-breaking ({} value changes, {} metadata-only)",
                summary.breaking, summary.non_breaking, summary.value_changed, summary.metadata_changed
            );
            for record in entries {
                println!("  {} {}", describe_kind(&record.entry), pointer_label(&record.entry));
            }
        }
        CommandResult::Policy { results, summary } => {
            println!(
                "Policy: {} error(s), {} warning(s), {} info across {} rule(s)",
                summary.error,
                summary.warning,
                summary.info,
                results.len()
            );
            for result in results {
                for violation in &result.violations {
                    println!(
                        "  [{:?}] {} {}: {}",
                        violation.severity, result.rule, violation.pointer, violation.message
                    );
                }
            }
        }
    }
}

fn print_json(result: &CommandResult) -> Result<(), CliError> {
    let payload = json!(result);
    println!("{payload}");
    Ok(())
}

fn describe_bump(bump: RecommendedBump) -> &'static str {
    match bump {
        RecommendedBump::Major => "major",
        RecommendedBump::Minor => "minor",
        RecommendedBump::Patch => "patch",
        RecommendedBump::None => "none",
    }
}

fn describe_kind(entry: &DiffEntry) -> &'static str {
    match entry {
        DiffEntry::Addition { .. } => "+",
        DiffEntry::Removal { .. } => "-",
        DiffEntry::Modification { .. } => "~",
        DiffEntry::Rename { .. } => "->",
    }
}

fn pointer_label(entry: &DiffEntry) -> String {
    match entry {
        DiffEntry::Addition { pointer, .. } => pointer.as_str().to_string(),
        DiffEntry::Removal { pointer, .. } => pointer.as_str().to_string(),
        DiffEntry::Modification { pointer, .. } => pointer.as_str().to_string(),
        DiffEntry::Rename {
            previous_pointer,
            next_pointer,
            ..
        } => format!("{previous_pointer} -> {next_pointer}"),
    }
}
