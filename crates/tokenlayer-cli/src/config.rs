use std::fs;
use std::path::Path;

use tokenlayer_core::{PipelineConfig, TokenSet, TokenSnapshot};

use crate::error::{CliError, ExitStatus};

/// Reads a [`PipelineConfig`] from a JSON file on disk.
///
/// The core deliberately ships no config-file loader (§4.9): `PipelineConfig` is a plain
/// serde-derived type and this is simply its one caller reading the bytes before handing the
/// parsed value to the library.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig, CliError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        CliError::new(
            format!("failed to read config {}: {err}", path.display()),
            ExitStatus::Io,
        )
    })?;
    serde_json::from_str(&raw).map_err(|err| {
        CliError::new(
            format!("failed to parse config {}: {err}", path.display()),
            ExitStatus::Config,
        )
    })
}

/// Reads a token set from a JSON file holding an array of [`TokenSnapshot`]s, the format a
/// `build` run's `--snapshot-out` would write and a `diff`/`policy` invocation reads back.
pub fn load_token_set(path: &Path) -> Result<TokenSet, CliError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        CliError::new(
            format!("failed to read token set {}: {err}", path.display()),
            ExitStatus::Io,
        )
    })?;
    let snapshots: Vec<TokenSnapshot> = serde_json::from_str(&raw).map_err(|err| {
        CliError::new(
            format!("failed to parse token set {}: {err}", path.display()),
            ExitStatus::Data,
        )
    })?;
    Ok(snapshots.into_iter().collect())
}

pub fn write_token_set(path: &Path, snapshots: &TokenSet) -> Result<(), CliError> {
    let list: Vec<&TokenSnapshot> = snapshots.iter().collect();
    let bytes = serde_json::to_vec_pretty(&list)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
