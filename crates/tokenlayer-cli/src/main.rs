use std::process::ExitCode;

fn main() -> ExitCode {
    tokenlayer_cli::run()
}
