use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSetBuilder};
use ignore::WalkBuilder;
use serde_json::Value as JsonValue;

use crate::config::{RepositoryConfig, VirtualDocument};

/// Context handed to a [`SourceRepository`] for a single discovery call.
#[derive(Clone, Debug)]
pub struct DiscoverContext {
    pub layer: String,
    pub source_index: usize,
}

/// A single document surfaced by discovery, before pointer-template expansion.
#[derive(Clone, Debug)]
pub struct DiscoveredDocument {
    pub uri: String,
    pub document: JsonValue,
    pub context: BTreeMap<String, JsonValue>,
    /// Absolute filesystem path, when the document came from the filesystem; used to
    /// derive `{relative, basename, stem}` pointer-template placeholders.
    pub path: Option<PathBuf>,
}

/// A non-fatal discovery failure — collected, not thrown (see §4.1 failure semantics).
#[derive(Clone, Debug)]
pub struct RepositoryIssue {
    pub message: String,
    pub uri: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DiscoverOutcome {
    pub documents: Vec<DiscoveredDocument>,
    pub issues: Vec<RepositoryIssue>,
}

/// Source Repository port (§6): `discover(context) → { documents, issues }`.
pub trait SourceRepository: Send + Sync {
    fn discover(&self, context: &DiscoverContext) -> DiscoverOutcome;
}

/// Filesystem-backed repository. Walks `root_dir` with `ignore::WalkBuilder`, filters by
/// `patterns` (globset), excludes `ignore` globs, parses each matched file as JSON, and
/// rejects any symlink that resolves outside `root_dir`.
pub struct FileGlobRepository {
    root_dir: PathBuf,
    patterns: Vec<String>,
    ignore: Vec<String>,
}

impl FileGlobRepository {
    pub fn new(root_dir: PathBuf, patterns: Vec<String>, ignore: Vec<String>) -> Self {
        Self {
            root_dir,
            patterns,
            ignore,
        }
    }

    pub fn from_config(config: &RepositoryConfig) -> Option<Self> {
        match config {
            RepositoryConfig::FileGlob {
                root_dir,
                patterns,
                ignore,
            } => Some(Self::new(root_dir.clone(), patterns.clone(), ignore.clone())),
            RepositoryConfig::Virtual { .. } => None,
        }
    }

    fn build_globset(patterns: &[String]) -> Result<globset::GlobSet, String> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|err| err.to_string())?;
            builder.add(glob);
        }
        builder.build().map_err(|err| err.to_string())
    }
}

impl SourceRepository for FileGlobRepository {
    fn discover(&self, _context: &DiscoverContext) -> DiscoverOutcome {
        let mut outcome = DiscoverOutcome::default();

        let include = match Self::build_globset(&self.patterns) {
            Ok(set) => set,
            Err(message) => {
                outcome.issues.push(RepositoryIssue {
                    message: format!("invalid glob pattern: {message}"),
                    uri: None,
                });
                return outcome;
            }
        };
        let exclude = match Self::build_globset(&self.ignore) {
            Ok(set) => set,
            Err(message) => {
                outcome.issues.push(RepositoryIssue {
                    message: format!("invalid ignore pattern: {message}"),
                    uri: None,
                });
                return outcome;
            }
        };

        let canonical_root = match fs::canonicalize(&self.root_dir) {
            Ok(root) => root,
            Err(err) => {
                outcome.issues.push(RepositoryIssue {
                    message: format!(
                        "unable to canonicalize root {}: {err}",
                        self.root_dir.display()
                    ),
                    uri: None,
                });
                return outcome;
            }
        };

        let walker = WalkBuilder::new(&self.root_dir)
            .follow_links(false)
            .standard_filters(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    outcome.issues.push(RepositoryIssue {
                        message: err.to_string(),
                        uri: None,
                    });
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            let relative = match path.strip_prefix(&self.root_dir) {
                Ok(relative) => relative,
                Err(_) => continue,
            };

            if !include.is_match(relative) || exclude.is_match(relative) {
                continue;
            }

            if let Err(message) = reject_escaping_symlink(path, &canonical_root) {
                outcome.issues.push(RepositoryIssue {
                    message,
                    uri: Some(relative.to_string_lossy().to_string()),
                });
                continue;
            }

            match load_document(path) {
                Ok(document) => outcome.documents.push(DiscoveredDocument {
                    uri: relative.to_string_lossy().replace('\\', "/"),
                    document,
                    context: BTreeMap::new(),
                    path: Some(path.to_path_buf()),
                }),
                Err(message) => outcome.issues.push(RepositoryIssue {
                    message,
                    uri: Some(relative.to_string_lossy().to_string()),
                }),
            }
        }

        outcome.documents.sort_by(|a, b| a.uri.cmp(&b.uri));
        outcome
    }
}

fn reject_escaping_symlink(path: &Path, canonical_root: &Path) -> Result<(), String> {
    let canonical = fs::canonicalize(path)
        .map_err(|err| format!("unable to canonicalize {}: {err}", path.display()))?;
    if !canonical.starts_with(canonical_root) {
        return Err(format!(
            "symlink {} escapes root {}",
            path.display(),
            canonical_root.display()
        ));
    }
    Ok(())
}

fn load_document(path: &Path) -> Result<JsonValue, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|err| format!("invalid JSON in {}: {err}", path.display()))
}

/// In-memory repository that simply replays its configured documents, for tests and for
/// embedding applications that already hold parsed documents in memory.
pub struct VirtualRepository {
    documents: Vec<VirtualDocument>,
}

impl VirtualRepository {
    pub fn new(documents: Vec<VirtualDocument>) -> Self {
        Self { documents }
    }

    pub fn from_config(config: &RepositoryConfig) -> Option<Self> {
        match config {
            RepositoryConfig::Virtual { documents } => Some(Self::new(documents.clone())),
            RepositoryConfig::FileGlob { .. } => None,
        }
    }
}

impl SourceRepository for VirtualRepository {
    fn discover(&self, _context: &DiscoverContext) -> DiscoverOutcome {
        DiscoverOutcome {
            documents: self
                .documents
                .iter()
                .cloned()
                .map(|doc| DiscoveredDocument {
                    uri: doc.uri,
                    document: doc.document,
                    context: doc.context,
                    path: None,
                })
                .collect(),
            issues: Vec::new(),
        }
    }
}
