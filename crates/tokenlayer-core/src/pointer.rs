use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A canonical JSON Pointer (RFC 6901), stored as its normalized string form.
///
/// The empty pointer (`#` / `""`) denotes the document root. Segments are separated by `/`,
/// with `~1` decoding to `/` and `~0` decoding to `~`.
#[derive(
    Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct JsonPointer(String);

impl JsonPointer {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Builds a pointer from already-decoded segments, escaping each one.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = String::new();
        for segment in segments {
            out.push('/');
            out.push_str(&escape_segment(segment.as_ref()));
        }
        Self(out)
    }

    /// Parses a raw pointer string, normalizing it (rejecting a trailing `#` prefix).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.strip_prefix('#').unwrap_or(raw);
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Decoded path segments, in order.
    pub fn segments(&self) -> Vec<String> {
        if self.0.is_empty() {
            return Vec::new();
        }
        self.0
            .split('/')
            .skip(1)
            .map(unescape_segment)
            .collect()
    }

    /// The first decoded segment, if any — used by the diff engine's `groups` filter.
    pub fn first_segment(&self) -> Option<String> {
        self.segments().into_iter().next()
    }

    /// Appends a single decoded segment, returning a new pointer.
    pub fn child(&self, segment: &str) -> Self {
        let mut out = self.0.clone();
        out.push('/');
        out.push_str(&escape_segment(segment));
        Self(out)
    }

    /// Appends a literal, already-escaped sub-pointer segment string (used when concatenating
    /// a plan-assigned `pointerPrefix` with a document-relative pointer).
    pub fn join_prefix(prefix: &JsonPointer, relative: &JsonPointer) -> Self {
        let mut out = prefix.0.clone();
        out.push_str(&relative.0);
        Self(out)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "#")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for JsonPointer {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for JsonPointer {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(segment: &str) -> String {
    // Order matters: ~1 before ~0 would corrupt a literal "~01" sequence otherwise.
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.peek() {
                Some('0') => {
                    out.push('~');
                    chars.next();
                }
                Some('1') => {
                    out.push('/');
                    chars.next();
                }
                _ => out.push('~'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
