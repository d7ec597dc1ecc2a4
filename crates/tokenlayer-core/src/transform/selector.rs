use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::token::{TokenSnapshot, TokenType};

/// A predicate over snapshots by type and/or path glob, used by transforms and formatters
/// alike (§4.4).
#[derive(Clone, Debug, Default)]
pub struct Selector {
    pub types: Option<Vec<TokenType>>,
    pub paths: Option<Vec<String>>,
}

impl Selector {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn types(types: Vec<TokenType>) -> Self {
        Self {
            types: Some(types),
            paths: None,
        }
    }

    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = Some(paths);
        self
    }

    /// A snapshot matches when its type is in `types` (or `types` is absent) and its pointer
    /// matches any `paths` glob (or `paths` is absent).
    pub fn matches(&self, snapshot: &TokenSnapshot) -> bool {
        let type_matches = match &self.types {
            None => true,
            Some(types) => snapshot
                .token_type()
                .map(|t| types.contains(&t))
                .unwrap_or(false),
        };
        if !type_matches {
            return false;
        }

        match &self.paths {
            None => true,
            Some(paths) => build_globset(paths)
                .map(|set| set.is_match(snapshot.pointer.as_str()))
                .unwrap_or(false),
        }
    }
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).ok()?);
    }
    builder.build().ok()
}
