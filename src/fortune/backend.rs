//! Fortune backend trait for abstracting the command behind the handlers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::options::FortuneOptions;
use crate::error::Result;

/// A single fortune.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FortuneResponse {
    /// The fortune text
    pub fortune: String,
    /// Cookie file the fortune came from, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl FortuneResponse {
    /// Create a response without source information.
    pub fn new(fortune: impl Into<String>) -> Self {
        Self {
            fortune: fortune.into(),
            source_file: None,
        }
    }
}

/// Fortunes matching a search pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matching fortunes
    pub matches: Vec<FortuneResponse>,
    /// Number of matches
    pub count: usize,
}

impl SearchResponse {
    /// Build a response from its matches.
    pub fn new(matches: Vec<FortuneResponse>) -> Self {
        let count = matches.len();
        Self { matches, count }
    }
}

/// Trait for fortune sources.
///
/// The HTTP handlers only see this trait, so tests can substitute a
/// canned implementation for the real executable.
#[async_trait]
pub trait FortuneBackend: Send + Sync {
    /// Produce one fortune.
    async fn fortune(&self, options: &FortuneOptions) -> Result<FortuneResponse>;

    /// List the available fortune files.
    async fn list_files(&self) -> Result<Vec<String>>;

    /// Find every fortune matching `pattern`.
    async fn search(&self, pattern: &str, options: FortuneOptions) -> Result<SearchResponse>;
}
