//! Type definitions for the allocation-provenance analysis.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// =============================================================================
// Source Location
// =============================================================================

/// Location in source code.
///
/// Uses 1-indexed line and column numbers to match editor and compiler
/// conventions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File path (as given on the command line, or resolved include path)
    pub file: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// End line number (1-indexed)
    pub end_line: usize,
    /// End column number (1-indexed)
    pub end_column: usize,
}

impl SourceLocation {
    /// Create a new source location.
    #[must_use]
    pub fn new(
        file: impl Into<String>,
        line: usize,
        column: usize,
        end_line: usize,
        end_column: usize,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Create a single-point location (start equals end).
    #[must_use]
    pub fn point(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an allocation scan.
#[derive(Debug, Clone)]
pub struct AllocScanConfig {
    /// `-I` style user include search directories.
    pub include_dirs: Vec<PathBuf>,
    /// System include directories. Anything located under one of these is a
    /// system-provided header: exempt from the audit, and the marker that an
    /// allocator declaration is library-provided rather than user-written.
    pub system_include_dirs: Vec<PathBuf>,
    /// How many levels of `#include` to follow when building the override index.
    pub max_include_depth: usize,
}

impl Default for AllocScanConfig {
    fn default() -> Self {
        Self {
            include_dirs: Vec::new(),
            system_include_dirs: vec![
                PathBuf::from("/usr/include"),
                PathBuf::from("/usr/local/include"),
            ],
            max_include_depth: 8,
        }
    }
}

impl AllocScanConfig {
    /// A configuration with no system directories at all.
    ///
    /// Useful for tests that must not depend on the host toolchain layout.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            include_dirs: Vec::new(),
            system_include_dirs: Vec::new(),
            max_include_depth: 8,
        }
    }
}

// =============================================================================
// Scan Report
// =============================================================================

/// A file the scan could not read or parse. The file is skipped; the failure
/// only surfaces through the process exit code and this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFailure {
    /// The input file that failed.
    pub file: String,
    /// Human-readable reason.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation::new("src/main.cpp", 10, 5, 10, 20);
        assert_eq!(loc.to_string(), "src/main.cpp:10:5");
    }

    #[test]
    fn test_source_location_point() {
        let loc = SourceLocation::point("a.cpp", 42, 8);
        assert_eq!(loc.line, 42);
        assert_eq!(loc.end_line, 42);
        assert_eq!(loc.column, 8);
        assert_eq!(loc.end_column, 8);
    }

    #[test]
    fn test_default_config_has_system_roots() {
        let config = AllocScanConfig::default();
        assert!(!config.system_include_dirs.is_empty());
        assert!(AllocScanConfig::bare().system_include_dirs.is_empty());
    }
}
