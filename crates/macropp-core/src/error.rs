use std::path::PathBuf;

use thiserror::Error;

/// Where a diagnostic happened: the file and 1-indexed line number of the
/// input context active at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Every fatal condition the engine can raise. Mirrors `bug()` call sites in
/// the original preprocessor: a single flat enum rather than a tree of
/// per-component error types, since every one of them aborts the run the
/// same way.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{location}: error: {message}")]
    Fatal { location: Location, message: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open include file: {0}")]
    IncludeNotFound(PathBuf),

    #[error("{location}: error: {message}")]
    UserError { location: Location, message: String },
}

impl EngineError {
    pub fn fatal(location: Location, message: impl Into<String>) -> Self {
        EngineError::Fatal {
            location,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
