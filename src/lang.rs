//! C++ language support.
//!
//! One language only: the probe scans C++ translation units through the
//! tree-sitter C++ grammar. This module owns parser construction and file
//! extension detection; everything semantic lives in [`crate::analysis`].

use std::path::Path;

use tree_sitter::Parser;

use crate::error::{AllocScanError, Result};

/// File extensions recognized as C++ sources or headers.
pub const CPP_EXTENSIONS: &[&str] = &[
    ".cpp", ".cc", ".cxx", ".hpp", ".hh", ".hxx", ".h++", ".c++", ".h",
];

/// Get a configured tree-sitter parser for C++.
pub fn cpp_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_cpp::LANGUAGE.into())
        .map_err(|e| AllocScanError::TreeSitter(e.to_string()))?;
    Ok(parser)
}

/// Check whether a path looks like a C++ translation unit or header.
pub fn is_cpp_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    CPP_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_detection() {
        assert!(is_cpp_file(Path::new("foo.cpp")));
        assert!(is_cpp_file(Path::new("dir/bar.hh")));
        assert!(is_cpp_file(Path::new("baz.h")));
        assert!(!is_cpp_file(Path::new("main.rs")));
        assert!(!is_cpp_file(Path::new("noext")));
    }

    #[test]
    fn test_parser_builds_tree() {
        let mut parser = cpp_parser().unwrap();
        let tree = parser.parse(b"int main() { return 0; }", None).unwrap();
        assert_eq!(tree.root_node().kind(), "translation_unit");
    }
}
