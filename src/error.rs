//! Error types.

use std::path::PathBuf;

/// Error while loading `docsync.toml` or resolving the provider.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no translation provider configured (set one of: {0})")]
    NoProvider(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Failure of a single provider call.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    /// Network error, timeout, broken connection.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("invalid JSON from provider: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("stream read failed: {0}")]
    Stream(#[from] std::io::Error),

    #[error("provider returned an empty translation")]
    Empty,
}

/// Conditions that abort one whole run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("source path does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("source path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("cannot access source path {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create target root {path}: {source}")]
    TargetRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure confined to one file; counted, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("{path}: cannot decode source text (guessed {encoding})")]
    Decode { path: PathBuf, encoding: String },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

impl FileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Error surfaced by a CLI command; maps to exit status 1.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Sync(#[from] SyncError),

    #[error("{0}")]
    Translate(#[from] TranslateError),

    #[error("{failed} file(s) failed, {aborted} job(s) aborted")]
    Incomplete { failed: usize, aborted: usize },

    #[error("{0} file(s) need translation")]
    Stale(usize),

    #[error("{unreadable} path(s) could not be read, {aborted} job(s) aborted")]
    Unchecked { unreadable: usize, aborted: usize },

    #[error("no job matches {0}")]
    NoJobs(String),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
