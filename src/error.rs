//! Central error types for allocscan.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic
//! `Display` and `From` implementations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum AllocScanError {
    /// IO operation failed (without path context - prefer IoWithPath when path is available)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO operation failed with path context for better error messages
    #[error("IO error at {path}: {error}")]
    IoWithPath {
        error: std::io::Error,
        path: PathBuf,
    },

    /// Failed to parse source file
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// Tree-sitter parsing/query error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// File is not a C++ translation unit this tool can scan
    #[error("Not a C++ source file: {0}")]
    NotCpp(String),
}

/// Convenience type alias for Results using AllocScanError.
pub type Result<T> = std::result::Result<T, AllocScanError>;

impl AllocScanError {
    /// Create an IO error with path context.
    ///
    /// Use this when reading files so the failing path shows up in the message.
    #[inline]
    pub fn io_with_path(error: std::io::Error, path: impl AsRef<Path>) -> Self {
        AllocScanError::IoWithPath {
            error,
            path: path.as_ref().to_path_buf(),
        }
    }
}
