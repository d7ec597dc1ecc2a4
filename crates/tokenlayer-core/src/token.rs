use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::pointer::JsonPointer;

/// Closed enum of token types recognised by the interchange schema.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "camelCase")]
pub enum TokenType {
    Border,
    Color,
    Component,
    Cursor,
    Dimension,
    Duration,
    Easing,
    Elevation,
    Filter,
    Font,
    FontFace,
    Gradient,
    #[serde(rename = "line-height")]
    LineHeight,
    Motion,
    Opacity,
    Shadow,
    StrokeStyle,
    Typography,
    #[serde(rename = "z-index")]
    ZIndex,
}

/// A reference expression (`$ref` / alias) pointing at another token.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TokenRef {
    pub pointer: JsonPointer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// The raw, per-layer view of a token before resolution.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Token {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    /// Exactly one of `value`/`raw` or `ref` is populated for a leaf token; enforced by
    /// the resolver rather than the type system so malformed documents degrade to a
    /// per-snapshot diagnostic instead of aborting the whole plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<JsonValue>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<TokenRef>,
}

impl Token {
    pub fn is_alias(&self) -> bool {
        self.reference.is_some()
    }
}

/// Free-form metadata attached to a token.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TokenMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub extensions: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Provenance carried by a token's reference chain.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ResolvedReference {
    pub pointer: JsonPointer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// The outcome of following a token's alias chain to its final value.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TokenResolution {
    pub references: Vec<ResolvedReference>,
    pub resolution_path: Vec<JsonPointer>,
    pub applied_aliases: Vec<JsonPointer>,
    pub value: JsonValue,
}

/// Which layer/source/document produced a snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Provenance {
    pub source_id: String,
    pub layer: String,
    pub layer_index: usize,
    pub uri: String,
    pub pointer_prefix: JsonPointer,
}

/// An immutable, flattened view of a single token with provenance and resolution.
///
/// Created by the resolver; never mutated afterwards. Referenced by the transform,
/// formatter, and policy engines, and dropped along with the build session that owns it.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TokenSnapshot {
    pub pointer: JsonPointer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_pointer: Option<JsonPointer>,
    pub token: Token,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TokenMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<TokenResolution>,
    pub provenance: Provenance,
    #[serde(default)]
    pub context: BTreeMap<String, JsonValue>,
}

impl TokenSnapshot {
    pub fn token_type(&self) -> Option<TokenType> {
        self.token.token_type
    }

    /// The value actually consumed by transforms/formatters: the resolved value when
    /// present, otherwise the raw leaf value.
    pub fn effective_value(&self) -> Option<&JsonValue> {
        if let Some(resolution) = &self.resolution {
            Some(&resolution.value)
        } else {
            self.token.value.as_ref()
        }
    }
}

/// An ordered mapping `pointer → snapshot`, preserving resolution order.
///
/// Invariant: no duplicate pointers; a later insertion for an existing pointer overrides
/// the earlier one (mirroring "later layers override earlier ones").
#[derive(Clone, Debug, Default)]
pub struct TokenSet {
    order: Vec<JsonPointer>,
    by_pointer: BTreeMap<JsonPointer, TokenSnapshot>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overrides a snapshot, preserving the original insertion position if the
    /// pointer already exists.
    pub fn insert(&mut self, snapshot: TokenSnapshot) {
        let pointer = snapshot.pointer.clone();
        if self.by_pointer.insert(pointer.clone(), snapshot).is_none() {
            self.order.push(pointer);
        }
    }

    pub fn get(&self, pointer: &JsonPointer) -> Option<&TokenSnapshot> {
        self.by_pointer.get(pointer)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn pointers(&self) -> impl Iterator<Item = &JsonPointer> {
        self.order.iter()
    }

    /// Iterates snapshots in resolution order (the order invariant required by the diff
    /// engine and transform engine alike).
    pub fn iter(&self) -> impl Iterator<Item = &TokenSnapshot> {
        self.order.iter().filter_map(move |p| self.by_pointer.get(p))
    }

    pub fn contains(&self, pointer: &JsonPointer) -> bool {
        self.by_pointer.contains_key(pointer)
    }
}

impl FromIterator<TokenSnapshot> for TokenSet {
    fn from_iter<I: IntoIterator<Item = TokenSnapshot>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for snapshot in iter {
            set.insert(snapshot);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pointer: &str) -> TokenSnapshot {
        TokenSnapshot {
            pointer: JsonPointer::parse(pointer),
            source_pointer: None,
            token: Token {
                id: pointer.to_string(),
                token_type: Some(TokenType::Color),
                value: Some(JsonValue::String("#fff".into())),
                raw: None,
                reference: None,
            },
            metadata: None,
            resolution: None,
            provenance: Provenance {
                source_id: "base".into(),
                layer: "base".into(),
                layer_index: 0,
                uri: "base.json".into(),
                pointer_prefix: JsonPointer::root(),
            },
            context: BTreeMap::new(),
        }
    }

    #[test]
    fn later_insert_overrides_but_keeps_position() {
        let mut set = TokenSet::new();
        set.insert(snapshot("/a"));
        set.insert(snapshot("/b"));
        let mut overridden = snapshot("/a");
        overridden.token.value = Some(JsonValue::String("#000".into()));
        set.insert(overridden);

        let order: Vec<_> = set.pointers().map(|p| p.as_str().to_string()).collect();
        assert_eq!(order, vec!["/a", "/b"]);
        assert_eq!(
            set.get(&JsonPointer::parse("/a"))
                .unwrap()
                .token
                .value
                .as_ref()
                .unwrap(),
            &JsonValue::String("#000".into())
        );
    }
}
