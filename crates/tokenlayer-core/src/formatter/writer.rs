use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

use super::definition::ArtifactContent;
use super::executor::FormatterExecutionResult;

/// Writes every execution's artifacts to disk, resolving each relative to the execution's
/// output directory (plan-level directory, falling back to the run's default). The only
/// component in the pipeline that touches the file system for output (§4.5 Artifact Writer).
pub struct ArtifactWriter;

impl ArtifactWriter {
    /// `default_out_dir` is `configDir/defaultOutDir` (§4.5, §4.9); `output_directories` maps
    /// execution id to its plan-level override, if any. Returns `executionId → written paths`,
    /// in execution order.
    pub fn write(
        results: &[FormatterExecutionResult],
        output_directories: &BTreeMap<String, PathBuf>,
        default_out_dir: &Path,
    ) -> PipelineResult<BTreeMap<String, Vec<PathBuf>>> {
        let mut written = BTreeMap::new();

        for result in results {
            let base = output_directories
                .get(&result.execution_id)
                .map(PathBuf::as_path)
                .unwrap_or(default_out_dir);

            let mut paths = Vec::with_capacity(result.artifacts.len());
            for artifact in &result.artifacts {
                let path = base.join(&artifact.path);
                Self::write_atomic(&path, &artifact.content)
                    .map_err(|err| err.context(format!("writing {}", path.display())))?;
                paths.push(path);
            }
            written.insert(result.execution_id.clone(), paths);
        }

        Ok(written)
    }

    /// Writes to a sibling temp file and renames into place, so a reader never observes a
    /// partially-written artifact (§5: no partial artifact is considered written on
    /// cancellation).
    fn write_atomic(path: &Path, content: &ArtifactContent) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = sibling_temp_path(path);
        let bytes: &[u8] = match content {
            ArtifactContent::Utf8 { text } => text.as_bytes(),
            ArtifactContent::Binary { bytes } => bytes,
        };

        fs::write(&temp_path, bytes).map_err(PipelineError::Io)?;
        fs::rename(&temp_path, path).map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            PipelineError::Io(err)
        })?;
        Ok(())
    }
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| format!(".{}.tmp", name.to_string_lossy()))
        .unwrap_or_else(|| ".artifact.tmp".to_string());
    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
