//! The concrete formatter and transform the `build` command registers. SPEC_FULL.md §2.1
//! describes the CLI as exercising the library end-to-end "without reimplementing any
//! concrete formatter" — these live here, in the binary, rather than in `tokenlayer-core`,
//! which ships only the selector/cache/registry machinery a formatter or transform plugs
//! into (see `tokenlayer_core::formatter::definition`, `tokenlayer_core::transform::definition`).

use serde_json::{json, Value as JsonValue};
use tokenlayer_core::formatter::{
    ArtifactContent, FileArtifact, FormatterDefinition, FormatterFactoryContext, FormatterToken,
};
use tokenlayer_core::transform::{Selector, TransformDefinition, TransformInput};

/// Flattens every resolved token into a single `tokens.json` artifact, keyed by pointer.
/// Mirrors the shape a real platform formatter (CSS custom properties, Swift enums, ...)
/// would consume as its own input, without committing this repository to any one of them.
/// Takes no options; registered under the name `"json-dump"`.
pub fn json_dump_formatter_factory(
    _options: &JsonValue,
    _context: &FormatterFactoryContext,
) -> FormatterDefinition {
    FormatterDefinition::new("json-dump", Selector::any(), run_json_dump)
}

fn run_json_dump(tokens: &[FormatterToken<'_>]) -> Vec<FileArtifact> {
    let mut entries = serde_json::Map::new();
    for token in tokens {
        let transforms: serde_json::Map<String, JsonValue> = token
            .transforms
            .iter()
            .map(|(name, value)| (name.clone(), (**value).clone()))
            .collect();
        entries.insert(
            token.pointer.as_str().to_string(),
            json!({
                "type": token.token_type,
                "value": token.value,
                "transforms": transforms,
            }),
        );
    }
    let text = serde_json::to_string_pretty(&entries).unwrap_or_default();
    vec![FileArtifact {
        path: "tokens.json".to_string(),
        content: ArtifactContent::Utf8 { text },
        metadata: Default::default(),
    }]
}

/// Re-emits each token's resolved value unchanged under its own name, demonstrating a
/// transform wired into a `build` run without claiming to perform any real platform
/// conversion. Registered directly into a `TransformRegistry` by the caller rather than
/// through a factory, since transforms are supplied alongside the config rather than
/// described by it (see `PipelineSession::build`).
pub fn passthrough_transform() -> TransformDefinition {
    TransformDefinition::new("passthrough", Selector::any(), |input: &TransformInput| {
        input.snapshot.effective_value().cloned()
    })
}
