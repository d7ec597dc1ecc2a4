use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command};
use serde_json::Value as JsonValue;
use tokenlayer_core::planner::SourcePlanner;
use tokenlayer_core::policy::{
    deprecation_replacement, require_override_approval, require_owner_extension, require_tag,
    wcag_contrast, PolicyEngine, PolicyRuleFactoryRegistry, PolicySummary,
};
use tokenlayer_core::resolver::Resolver;

use crate::commands::CommandResult;
use crate::config::load_pipeline_config;
use crate::error::CliError;

/// Standalone: plans and resolves a config's sources directly rather than running a full
/// `PipelineSession::build`, since evaluating policy needs neither transforms nor formatters
/// (§2.1 describes `policy` as a standalone command alongside `diff`).
pub fn command() -> Command {
    Command::new("policy")
        .about("Evaluate configured policy rules against a resolved token set")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .required(true)
                .help("Path to a PipelineConfig JSON file; only its sources and policies are used"),
        )
        .arg(
            Arg::new("policy-context")
                .long("policy-context")
                .value_name("JSON")
                .help("A JSON object supplied to policy handlers alongside each snapshot"),
        )
}

pub fn run(matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let config_path = PathBuf::from(matches.get_one::<String>("config").expect("required"));
    let config = load_pipeline_config(&config_path)?;

    let context: BTreeMap<String, JsonValue> = match matches.get_one::<String>("policy-context") {
        Some(raw) => serde_json::from_str(raw)?,
        None => BTreeMap::new(),
    };

    let plan = SourcePlanner::new().plan(&config)?;
    let resolved = Resolver::new().resolve(&plan)?;
    let snapshots = resolved.merged_token_set();

    let mut registry = PolicyRuleFactoryRegistry::new();
    registry.register("require-owner", require_owner_extension);
    registry.register("require-tag", require_tag);
    registry.register("deprecation-replacement", deprecation_replacement);
    registry.register("require-override-approval", require_override_approval);
    registry.register("wcag-contrast", wcag_contrast);

    let results = PolicyEngine::new(&registry).evaluate(&config.policies, &snapshots, &context)?;
    let summary = PolicySummary::build(&results);

    Ok(CommandResult::Policy { results, summary })
}
