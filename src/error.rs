//! Error taxonomy (spec §7). Kinds, not names: each variant maps to exactly
//! one of IoError / GitError / ParseError / ConfigError / BudgetError /
//! EmptyResultError. Propagation policy lives with the callers — most
//! variants here are logged-and-swallowed at the Indexer boundary rather
//! than bubbled, per §7's table.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("git probe failed: {0}")]
    Git(String),

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("budget error: no files fit within {budget_tokens} tokens")]
    Budget { budget_tokens: usize },

    #[error("empty result: no candidates found for the resolved task")]
    EmptyResult,
}

impl ContextError {
    /// Stable short code surfaced in single-line diagnostics, per §7.
    pub fn code(&self) -> &'static str {
        match self {
            ContextError::Io { .. } => "E_IO",
            ContextError::Store(_) => "E_STORE",
            ContextError::Git(_) => "E_GIT",
            ContextError::Parse { .. } => "E_PARSE",
            ContextError::Config(_) => "E_CONFIG",
            ContextError::Budget { .. } => "E_BUDGET",
            ContextError::EmptyResult => "E_EMPTY",
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContextError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ContextError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A recoverable condition recorded into `PackManifest.warnings` instead of
/// aborting the pipeline. Distinguished from `ContextError` in that it never
/// escapes as a caller-visible `Err`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Warning {
    pub code: String,
    pub message: String,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn from_error(err: &ContextError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}
