use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_EXTENSIONS: [&str; 2] = [".md", ".mdx"];

/// Path segment whose whole subtree is copied, never translated.
pub const DEFAULT_PASSTHROUGH_SEGMENT: &str = "LLMs";

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect()
}

fn default_passthrough_segment() -> Option<String> {
    Some(DEFAULT_PASSTHROUGH_SEGMENT.to_string())
}

fn default_verbose() -> bool {
    true
}

/// One (source, target, language) triple.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub source: PathBuf,
    pub target: PathBuf,

    /// Human-readable language label handed to the provider, e.g. "Français".
    #[serde(alias = "lang")]
    pub language: String,
}

impl SyncJob {
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            language: language.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_passthrough_segment")]
    pub passthrough_segment: Option<String>,

    /// Per-file progress at info level instead of debug.
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            passthrough_segment: default_passthrough_segment(),
            verbose: default_verbose(),
        }
    }
}

impl SyncOptions {
    /// Case-insensitive; configured extensions may omit the leading dot.
    pub fn is_translatable_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}
