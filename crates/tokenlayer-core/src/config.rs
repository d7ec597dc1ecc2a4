use std::collections::BTreeMap;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A named tier of sources contributing tokens; later layers override earlier ones at the
/// same pointer.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub context: BTreeMap<String, JsonValue>,
}

/// Where a source's documents live: a glob over the filesystem, or an in-memory supplier
/// (the latter is configured by the embedding application, not parsed from a file).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepositoryConfig {
    FileGlob {
        root_dir: PathBuf,
        patterns: Vec<String>,
        #[serde(default)]
        ignore: Vec<String>,
    },
    Virtual {
        #[serde(default)]
        documents: Vec<VirtualDocument>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct VirtualDocument {
    pub uri: String,
    pub document: JsonValue,
    #[serde(default)]
    pub context: BTreeMap<String, JsonValue>,
}

/// A configured origin producing one or more documents within a named layer.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct SourceConfig {
    pub layer: String,
    pub repository: RepositoryConfig,
    /// Literal segments and `{relative, basename, stem, source}` placeholders.
    pub pointer_template: String,
    #[serde(default)]
    pub context: BTreeMap<String, JsonValue>,
}

/// A formatter instance request: which factory to invoke, its options, and output location.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct FormatterInstanceConfig {
    pub name: String,
    #[serde(default)]
    pub options: JsonValue,
    #[serde(default)]
    pub output: FormatterOutputConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct FormatterOutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// A policy rule instance request: which factory to invoke and its options.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct PolicyInstanceConfig {
    pub name: String,
    #[serde(default)]
    pub options: JsonValue,
}

/// The full, pre-parsed configuration a pipeline session is built from.
///
/// Parsing this out of an on-disk config file (TOML/YAML/JSON, env overlays, CLI flag
/// merging) is out of scope for the core; callers already holding a `PipelineConfig` are
/// the only expected entry point.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    pub layers: Vec<LayerConfig>,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub formatters: Vec<FormatterInstanceConfig>,
    #[serde(default)]
    pub policies: Vec<PolicyInstanceConfig>,
    pub default_out_dir: PathBuf,
}
