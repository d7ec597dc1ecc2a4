use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command};
use tokenlayer_core::diff::{DiffEngine, DiffFilter};

use crate::commands::{CommandResult, DiffEntryRecord};
use crate::config::load_token_set;
use crate::error::CliError;

/// Standalone: compares two already-resolved token sets without going through
/// `PipelineSession::build` (§2.1 describes `diff` as a standalone command).
pub fn command() -> Command {
    Command::new("diff")
        .about("Compare two resolved token sets")
        .arg(
            Arg::new("previous")
                .long("previous")
                .value_name("PATH")
                .required(true)
                .help("JSON file holding the previous token set, an array of TokenSnapshot"),
        )
        .arg(
            Arg::new("next")
                .long("next")
                .value_name("PATH")
                .required(true)
                .help("JSON file holding the next token set"),
        )
        .arg(
            Arg::new("group")
                .long("group")
                .value_name("GROUP")
                .action(clap::ArgAction::Append)
                .help("Restrict the diff to entries under this top-level pointer segment"),
        )
}

pub fn run(matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let previous = load_token_set(&PathBuf::from(
        matches.get_one::<String>("previous").expect("required"),
    ))?;
    let next = load_token_set(&PathBuf::from(
        matches.get_one::<String>("next").expect("required"),
    ))?;

    let groups: Option<Vec<String>> = matches
        .get_many::<String>("group")
        .map(|values| values.cloned().collect());

    let result = DiffEngine::new().diff(&previous, &next);
    let result = match groups {
        Some(groups) => result.filtered(&DiffFilter {
            groups: Some(groups),
            ..Default::default()
        }),
        None => result,
    };

    let entries = result
        .entries
        .into_iter()
        .map(|(entry, impact)| DiffEntryRecord { impact, entry })
        .collect();

    Ok(CommandResult::Diff {
        summary: result.summary,
        entries,
    })
}
