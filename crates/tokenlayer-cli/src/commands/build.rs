use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Arg, ArgMatches, Command};
use serde_json::Value as JsonValue;
use tokenlayer_core::cancellation::CancellationToken;
use tokenlayer_core::dependency::FileDependencyStore;
use tokenlayer_core::formatter::FormatterFactoryRegistry;
use tokenlayer_core::policy::{
    deprecation_replacement, require_override_approval, require_owner_extension, require_tag,
    wcag_contrast, PolicyRuleFactoryRegistry,
};
use tokenlayer_core::session::PipelineSession;
use tokenlayer_core::transform::{TransformEngine, TransformRegistry, ContentAddressedTransformCache};

use crate::commands::CommandResult;
use crate::config::{load_pipeline_config, write_token_set};
use crate::demo::{json_dump_formatter_factory, passthrough_transform};
use crate::error::{CliError, ExitStatus};

pub fn command() -> Command {
    Command::new("build")
        .about("Run the pipeline end to end: plan, resolve, transform, format, and write artifacts")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .required(true)
                .help("Path to a PipelineConfig JSON file"),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .value_name("PATH")
                .help("Directory for the dependency and transform caches. Defaults to .tokenlayer/cache"),
        )
        .arg(
            Arg::new("policy-context")
                .long("policy-context")
                .value_name("JSON")
                .help("A JSON object supplied to policy handlers alongside each snapshot"),
        )
        .arg(
            Arg::new("snapshot-out")
                .long("snapshot-out")
                .value_name("PATH")
                .help("Write the resolved token set here, in the array-of-TokenSnapshot form `diff`/`policy` read back"),
        )
}

pub fn run(matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let config_path = PathBuf::from(matches.get_one::<String>("config").expect("required"));
    let config = load_pipeline_config(&config_path)?;

    let cache_dir = matches
        .get_one::<String>("cache-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".tokenlayer/cache"));

    let policy_context: BTreeMap<String, JsonValue> = match matches.get_one::<String>("policy-context") {
        Some(raw) => serde_json::from_str(raw)?,
        None => BTreeMap::new(),
    };

    let mut formatter_registry = FormatterFactoryRegistry::new();
    formatter_registry.register("json-dump", json_dump_formatter_factory);

    let mut policy_registry = PolicyRuleFactoryRegistry::new();
    policy_registry.register("require-owner", require_owner_extension);
    policy_registry.register("require-tag", require_tag);
    policy_registry.register("deprecation-replacement", deprecation_replacement);
    policy_registry.register("require-override-approval", require_override_approval);
    policy_registry.register("wcag-contrast", wcag_contrast);

    let mut transforms = TransformRegistry::new();
    transforms.register(passthrough_transform());

    let session = PipelineSession::new(
        Arc::new(FileDependencyStore::new(cache_dir.join("dependency"))),
        TransformEngine::new(Arc::new(ContentAddressedTransformCache::new(
            cache_dir.join("transform"),
        ))),
        formatter_registry,
        policy_registry,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(err.to_string(), ExitStatus::Software))?;

    let outcome = runtime.block_on(session.build(
        &config,
        &transforms,
        &policy_context,
        &CancellationToken::new(),
    ))?;

    if let Some(raw) = matches.get_one::<String>("snapshot-out") {
        write_token_set(&PathBuf::from(raw), &outcome.snapshots)?;
    }

    Ok(CommandResult::Build {
        token_count: outcome.snapshots.len(),
        resolve_metrics: outcome.resolve_metrics,
        diagnostics: outcome.diagnostics,
        dependency_diff: outcome.dependency_diff,
        transform_results: outcome.transform_results,
        formatter_results: outcome.formatter_results,
        written_artifacts: outcome.written_artifacts,
        policy_results: outcome.policy_results,
        policy_summary: outcome.policy_summary,
    })
}
