use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::pointer::JsonPointer;
use crate::token::{TokenSnapshot, TokenType};
use crate::transform::Selector;

/// One token as seen by a formatter: its snapshot plus every transform output computed for
/// it, keyed by transform name (§6 Formatter definition factory port).
pub struct FormatterToken<'a> {
    pub snapshot: &'a TokenSnapshot,
    pub pointer: &'a JsonPointer,
    pub token_type: Option<TokenType>,
    pub value: Option<&'a JsonValue>,
    pub transforms: BTreeMap<String, &'a JsonValue>,
}

/// Contents the artifact writer places on disk. `Utf8` is written as text; `Binary` is
/// written as raw bytes (§4.5, §6).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "encoding", rename_all = "lowercase")]
pub enum ArtifactContent {
    Utf8 { text: String },
    Binary { bytes: Vec<u8> },
}

/// One file a formatter wants written, with a path relative to the execution's output
/// directory and free-form metadata the executor enriches before writing (§4.5).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FileArtifact {
    pub path: String,
    pub content: ArtifactContent,
    #[serde(default)]
    pub metadata: BTreeMap<String, JsonValue>,
}

/// A formatter's pure emission step: given the matched tokens, produce zero or more file
/// artifacts. Distinct from [`crate::transform::TransformRun`] — a formatter consumes the
/// whole matched set at once rather than one snapshot at a time, since most platform
/// emitters need cross-token context (e.g. one CSS file for all color tokens).
pub trait FormatterRun: Send + Sync {
    fn run(&self, tokens: &[FormatterToken]) -> Vec<FileArtifact>;
}

impl<F> FormatterRun for F
where
    F: Fn(&[FormatterToken]) -> Vec<FileArtifact> + Send + Sync,
{
    fn run(&self, tokens: &[FormatterToken]) -> Vec<FileArtifact> {
        self(tokens)
    }
}

/// `{ name, selector, run }` produced by a [`FormatterDefinitionFactory`] (§6).
#[derive(Clone)]
pub struct FormatterDefinition {
    pub name: String,
    pub selector: Selector,
    runner: Arc<dyn FormatterRun>,
}

impl FormatterDefinition {
    pub fn new(name: impl Into<String>, selector: Selector, runner: impl FormatterRun + 'static) -> Self {
        Self {
            name: name.into(),
            selector,
            runner: Arc::new(runner),
        }
    }

    pub fn run(&self, tokens: &[FormatterToken]) -> Vec<FileArtifact> {
        self.runner.run(tokens)
    }
}

impl fmt::Debug for FormatterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Context handed to a formatter definition factory: the instance's options plus whatever
/// ambient identifiers the factory needs (§6: `create(entry, context)`).
#[derive(Clone, Debug, Default)]
pub struct FormatterFactoryContext {
    pub instance_index: usize,
}

/// Produces a [`FormatterDefinition`] from a configured instance's options. Registered under
/// a formatter name in a [`FormatterFactoryRegistry`] (§4.5 Formatter Definition Factory
/// Registry).
pub trait FormatterDefinitionFactory: Send + Sync {
    fn create(
        &self,
        options: &JsonValue,
        context: &FormatterFactoryContext,
    ) -> FormatterDefinition;
}

impl<F> FormatterDefinitionFactory for F
where
    F: Fn(&JsonValue, &FormatterFactoryContext) -> FormatterDefinition + Send + Sync,
{
    fn create(&self, options: &JsonValue, context: &FormatterFactoryContext) -> FormatterDefinition {
        self(options, context)
    }
}

/// Name-keyed registry of formatter factories, consulted by the orchestrator's planner
/// (§4.5). Re-registering a name overwrites the previous factory.
#[derive(Default, Clone)]
pub struct FormatterFactoryRegistry {
    factories: BTreeMap<String, Arc<dyn FormatterDefinitionFactory>>,
}

impl FormatterFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: impl FormatterDefinitionFactory + 'static) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FormatterDefinitionFactory>> {
        self.factories.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_lookup_by_name_and_overwrite() {
        let mut registry = FormatterFactoryRegistry::new();
        registry.register("css", |_: &JsonValue, _: &FormatterFactoryContext| {
            FormatterDefinition::new("css", Selector::any(), |_: &[FormatterToken]| Vec::new())
        });
        assert!(registry.get("css").is_some());
        assert!(registry.get("missing").is_none());

        registry.register("css", |_: &JsonValue, _: &FormatterFactoryContext| {
            FormatterDefinition::new("css-v2", Selector::any(), |_: &[FormatterToken]| Vec::new())
        });
        let factory = registry.get("css").unwrap();
        let definition = factory.create(&json!(null), &FormatterFactoryContext::default());
        assert_eq!(definition.name, "css-v2");
    }
}
