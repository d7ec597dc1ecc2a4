use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::token::TokenSnapshot;

use super::selector::Selector;

/// The input handed to a transform's `run` function: the snapshot being transformed plus its
/// instance options.
pub struct TransformInput<'a> {
    pub snapshot: &'a TokenSnapshot,
    pub options: &'a JsonValue,
}

/// A pure, deterministic per-token transformation. `None` means "not applicable to this
/// snapshot" (§3 Transform Definition) — distinct from an empty/null output.
pub trait TransformRun: Send + Sync {
    fn run(&self, input: &TransformInput) -> Option<JsonValue>;
}

impl<F> TransformRun for F
where
    F: Fn(&TransformInput) -> Option<JsonValue> + Send + Sync,
{
    fn run(&self, input: &TransformInput) -> Option<JsonValue> {
        self(input)
    }
}

/// `{ name, selector, run }` plus instance options and an optional group identifier (§3, §4.4).
#[derive(Clone)]
pub struct TransformDefinition {
    pub name: String,
    pub selector: Selector,
    pub options: JsonValue,
    pub group: Option<String>,
    runner: Arc<dyn TransformRun>,
}

impl TransformDefinition {
    pub fn new(
        name: impl Into<String>,
        selector: Selector,
        runner: impl TransformRun + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            selector,
            options: JsonValue::Null,
            group: None,
            runner: Arc::new(runner),
        }
    }

    pub fn with_options(mut self, options: JsonValue) -> Self {
        self.options = options;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn run(&self, input: &TransformInput) -> Option<JsonValue> {
        self.runner.run(input)
    }
}

impl fmt::Debug for TransformDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformDefinition")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// Mapping from name to definition; iteration order is the order of first registration
/// (§4.4), and re-registering an existing name overwrites in place without moving its slot.
#[derive(Default)]
pub struct TransformRegistry {
    definitions: Vec<TransformDefinition>,
    index: HashMap<String, usize>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: TransformDefinition) {
        if let Some(&i) = self.index.get(&definition.name) {
            self.definitions[i] = definition;
        } else {
            self.index.insert(definition.name.clone(), self.definitions.len());
            self.definitions.push(definition);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TransformDefinition> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_order_is_preserved_and_overwrite_keeps_slot() {
        let mut registry = TransformRegistry::new();
        registry.register(TransformDefinition::new("a", Selector::any(), |_: &TransformInput| None));
        registry.register(TransformDefinition::new("b", Selector::any(), |_: &TransformInput| None));
        registry.register(
            TransformDefinition::new("a", Selector::any(), |_: &TransformInput| {
                Some(JsonValue::Bool(true))
            })
            .with_group("web"),
        );

        let names: Vec<_> = registry.iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.get("a").unwrap().group.as_deref(), Some("web"));
    }
}
