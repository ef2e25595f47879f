// src/traverse/predicate.rs
// =============================================================================
// What counts as a "hit" when a leaf node's content is read.
//
// Any Fn(&str) -> bool closure works; ContainsKeyword covers the CLI's
// --keyword flag.
// =============================================================================

use crate::error::ConfigError;

/// Decides whether a leaf's content is a hit
pub trait Predicate: Send + Sync + 'static {
    fn is_match(&self, content: &str) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    fn is_match(&self, content: &str) -> bool {
        self(content)
    }
}

/// Matches content that contains a keyword
#[derive(Debug, Clone)]
pub struct ContainsKeyword {
    needle: String,
    // Lowercased copy, only set while matching ignores case
    folded: Option<String>,
}

impl ContainsKeyword {
    pub fn new(keyword: impl Into<String>) -> Result<Self, ConfigError> {
        let needle = keyword.into();
        if needle.is_empty() {
            return Err(ConfigError::EmptyKeyword);
        }
        Ok(Self {
            needle,
            folded: None,
        })
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.folded = ignore_case.then(|| self.needle.to_lowercase());
        self
    }
}

impl Predicate for ContainsKeyword {
    fn is_match(&self, content: &str) -> bool {
        match &self.folded {
            Some(folded) => content.to_lowercase().contains(folded.as_str()),
            None => content.contains(self.needle.as_str()),
        }
    }
}
