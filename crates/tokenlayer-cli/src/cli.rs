use std::ffi::OsString;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::commands;
use crate::error::{CliError, ExitStatus};
use crate::formatter::{emit_result, OutputFormat};

const NAME: &str = "tokenlayer";

pub fn run() -> ExitCode {
    init_tracing();
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses CLI arguments and dispatches to the appropriate command, returning a POSIX
/// `sysexits`-compatible `ExitCode` so automation can react deterministically.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let command = build_cli();
    let matches = command.try_get_matches_from(args)?;

    let output = if matches.get_flag("json") {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let result = dispatch(&matches)?;
    emit_result(result, output)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Defines the root `clap::Command` tree: `build` runs the full pipeline, `diff` and
/// `policy` are standalone commands operating on already-resolved token sets (§2.1).
fn build_cli() -> Command {
    Command::new(NAME)
        .about("Design token build pipeline")
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit pretty-printed JSON instead of human-readable text"),
        )
        .subcommand_required(true)
        .subcommand(commands::build::command())
        .subcommand(commands::diff::command())
        .subcommand(commands::policy::command())
}

fn dispatch(matches: &ArgMatches) -> Result<commands::CommandResult, CliError> {
    match matches.subcommand() {
        Some(("build", sub)) => commands::build::run(sub),
        Some(("diff", sub)) => commands::diff::run(sub),
        Some(("policy", sub)) => commands::policy::run(sub),
        _ => Err(CliError::new("missing command", ExitStatus::Usage)),
    }
}
