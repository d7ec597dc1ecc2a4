use serde_json::Value as JsonValue;

use crate::pointer::JsonPointer;
use crate::token::{Token, TokenMetadata, TokenRef, TokenType};

/// A single flattened, not-yet-resolved token discovered inside a document.
#[derive(Clone, Debug)]
pub struct RawToken {
    pub pointer: JsonPointer,
    pub source_pointer: JsonPointer,
    pub token: Token,
    pub metadata: Option<TokenMetadata>,
}

const LEAF_KEYS: [&str; 2] = ["value", "ref"];
const METADATA_KEYS: [&str; 4] = ["description", "extensions", "deprecated", "tags"];

/// Walks a document tree, producing `(pointer, rawToken, metadata)` triples.
///
/// A JSON object is treated as a token leaf when it carries a `value` or `ref` key;
/// otherwise every key is treated as a nested group and walked recursively.
pub fn flatten_document(document: &JsonValue, pointer_prefix: &JsonPointer) -> Vec<RawToken> {
    let mut out = Vec::new();
    walk(document, &JsonPointer::root(), pointer_prefix, &mut out);
    out
}

fn walk(
    node: &JsonValue,
    source_pointer: &JsonPointer,
    pointer_prefix: &JsonPointer,
    out: &mut Vec<RawToken>,
) {
    let JsonValue::Object(map) = node else {
        return;
    };

    if LEAF_KEYS.iter().any(|key| map.contains_key(*key)) {
        if let Some(raw) = parse_leaf(map, source_pointer, pointer_prefix) {
            out.push(raw);
        }
        return;
    }

    for (key, child) in map {
        let child_source_pointer = source_pointer.child(key);
        walk(child, &child_source_pointer, pointer_prefix, out);
    }
}

fn parse_leaf(
    map: &serde_json::Map<String, JsonValue>,
    source_pointer: &JsonPointer,
    pointer_prefix: &JsonPointer,
) -> Option<RawToken> {
    let pointer = JsonPointer::join_prefix(pointer_prefix, source_pointer);
    let id = pointer.segments().join(".");

    let token_type = map
        .get("type")
        .cloned()
        .and_then(|v| serde_json::from_value::<TokenType>(v).ok());

    let reference = map.get("ref").and_then(|v| v.as_str()).map(|raw| {
        let (uri, pointer_part) = match raw.split_once('#') {
            Some((uri, pointer)) if !uri.is_empty() => (Some(uri.to_string()), pointer),
            Some((_, pointer)) => (None, pointer),
            None => (None, raw),
        };
        TokenRef {
            pointer: JsonPointer::parse(pointer_part),
            uri,
        }
    });

    let value = map.get("value").cloned();
    let raw_value = map.get("raw").cloned();

    if reference.is_none() && value.is_none() {
        return None;
    }

    let metadata = if METADATA_KEYS.iter().any(|key| map.contains_key(*key)) {
        Some(TokenMetadata {
            description: map
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            extensions: map
                .get("extensions")
                .and_then(|v| v.as_object())
                .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
            deprecated: map.get("deprecated").and_then(|v| v.as_bool()),
            tags: map.get("tags").and_then(|v| v.as_array()).map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            }),
        })
    } else {
        None
    };

    Some(RawToken {
        pointer,
        source_pointer: source_pointer.clone(),
        token: Token {
            id,
            token_type,
            value,
            raw: raw_value,
            reference,
        },
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_groups_into_leaf_pointers() {
        let document = json!({
            "color": {
                "brand": {
                    "primary": { "type": "color", "value": "#ff0000" }
                }
            }
        });
        let tokens = flatten_document(&document, &JsonPointer::root());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].pointer.as_str(), "/color/brand/primary");
        assert_eq!(tokens[0].token.token_type, Some(TokenType::Color));
    }

    #[test]
    fn applies_pointer_prefix() {
        let document = json!({ "primary": { "value": "#fff" } });
        let prefix = JsonPointer::parse("/tokens/base");
        let tokens = flatten_document(&document, &prefix);
        assert_eq!(tokens[0].pointer.as_str(), "/tokens/base/primary");
    }

    #[test]
    fn parses_same_document_ref() {
        let document = json!({ "alias": { "ref": "#/color/brand/primary" } });
        let tokens = flatten_document(&document, &JsonPointer::root());
        assert_eq!(
            tokens[0].token.reference.as_ref().unwrap().pointer.as_str(),
            "/color/brand/primary"
        );
    }
}
