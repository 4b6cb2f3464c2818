//! Semantic context: the approximation of allocation-function resolution.
//!
//! A real compiler resolves `new T` through overload resolution against
//! class-scoped and replacement `operator new` declarations. This module
//! rebuilds just enough of that from parse trees alone: it indexes every
//! `operator new`/`operator delete` declaration visible from the translation
//! unit (the unit itself plus every resolvable `#include`, followed
//! recursively), records where each was declared and whether that file is
//! system-provided, and recovers static pointee types for `delete` operands
//! from preceding declarations.
//!
//! Anything the index cannot answer is resolution ambiguity: treated as
//! "no applicable override", never surfaced as an error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tracing::{debug, trace};
use tree_sitter::{Node, Query, QueryCursor, Tree};

use crate::lang::cpp_parser;

use super::helpers::{
    collect_nodes, declarator_identifier, location_from_node, node_text, normalize_type_name,
};
use super::types::{AllocScanConfig, SourceLocation};

/// Find allocation/deallocation operator names.
const OPERATOR_NAME_QUERY: &str = "(operator_name) @op";

/// Find include directives.
const INCLUDE_QUERY: &str = "(preproc_include path: (_) @path)";

static OPERATOR_QUERY: Lazy<Query> = Lazy::new(|| {
    Query::new(&tree_sitter_cpp::LANGUAGE.into(), OPERATOR_NAME_QUERY)
        .expect("Invalid operator_name query")
});

static INCLUDES_QUERY: Lazy<Query> = Lazy::new(|| {
    Query::new(&tree_sitter_cpp::LANGUAGE.into(), INCLUDE_QUERY)
        .expect("Invalid preproc_include query")
});

// =============================================================================
// Override index
// =============================================================================

/// Which allocation operator a declaration provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    New,
    NewArray,
    Delete,
    DeleteArray,
}

impl OperatorKind {
    /// Parse a spelled `operator_name` ("operator new []", "operator delete").
    fn from_operator_name(text: &str) -> Option<Self> {
        let name: String = text
            .strip_prefix("operator")?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match name.as_str() {
            "new" => Some(Self::New),
            "new[]" => Some(Self::NewArray),
            "delete" => Some(Self::Delete),
            "delete[]" => Some(Self::DeleteArray),
            _ => None,
        }
    }
}

/// One indexed `operator new`/`operator delete` declaration.
#[derive(Debug, Clone)]
pub struct OverrideDecl {
    pub kind: OperatorKind,
    /// Enclosing class for class-scoped operators; `None` for namespace or
    /// file scope replacements.
    pub class: Option<String>,
    /// Where the operator name is declared.
    pub location: SourceLocation,
    /// Declaring file lies under a system include directory.
    pub in_system_header: bool,
}

#[derive(Debug, Default)]
struct OverrideIndex {
    decls: Vec<OverrideDecl>,
}

impl OverrideIndex {
    fn class_override(&self, class: &str, kind: OperatorKind) -> Option<&OverrideDecl> {
        self.decls
            .iter()
            .find(|d| d.kind == kind && d.class.as_deref() == Some(class))
    }

    fn replacement(&self, kind: OperatorKind) -> Option<&OverrideDecl> {
        self.decls
            .iter()
            .find(|d| d.kind == kind && d.class.is_none())
    }
}

// =============================================================================
// Semantic context
// =============================================================================

#[derive(Debug)]
struct VarBinding {
    name: String,
    /// Normalized class name of the declared type; `None` for builtin types.
    class: Option<String>,
    /// Byte offset where the declaration ends, for "nearest preceding" lookup.
    end_byte: usize,
}

/// Per-translation-unit semantic context, owned by the driver for the
/// lifetime of one file's processing and passed by reference into
/// classification.
pub struct SemanticContext {
    /// The translation unit path as spelled on the command line.
    pub file: String,
    /// The translation unit itself lies in a system-provided location.
    pub file_is_system: bool,
    overrides: OverrideIndex,
    bindings: Vec<VarBinding>,
    system_dirs: Vec<PathBuf>,
}

impl SemanticContext {
    /// Build the context for one parsed translation unit.
    ///
    /// Never fails: unreadable or unresolvable includes are logged and
    /// skipped, leaving their operators out of the index.
    pub fn build(path: &Path, tree: &Tree, source: &[u8], config: &AllocScanConfig) -> Self {
        let system_dirs: Vec<PathBuf> = config
            .system_include_dirs
            .iter()
            .map(|d| d.canonicalize().unwrap_or_else(|_| d.clone()))
            .collect();

        let mut ctx = Self {
            file: path.display().to_string(),
            file_is_system: path_is_system(path, &system_dirs),
            overrides: OverrideIndex::default(),
            bindings: Vec::new(),
            system_dirs,
        };

        let file_str = ctx.file.clone();
        let file_is_system = ctx.file_is_system;
        ctx.index_operator_decls(tree, source, &file_str, file_is_system);
        ctx.collect_bindings(tree, source);

        let mut visited = HashSet::new();
        if let Ok(canonical) = path.canonicalize() {
            visited.insert(canonical);
        }
        let including_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        ctx.walk_includes(tree, source, &including_dir, config, &mut visited, 0);
        ctx
    }

    /// Is a path system-provided under this context's configuration?
    pub fn is_system_path(&self, path: &Path) -> bool {
        path_is_system(path, &self.system_dirs)
    }

    /// Class-scoped operator declaration for `class`, exact kind match.
    pub fn class_override(&self, class: &str, kind: OperatorKind) -> Option<&OverrideDecl> {
        self.overrides.class_override(class, kind)
    }

    /// Namespace/file scope replacement operator, exact kind match.
    pub fn replacement_override(&self, kind: OperatorKind) -> Option<&OverrideDecl> {
        self.overrides.replacement(kind)
    }

    /// Recover the static pointee class of an identifier from the nearest
    /// preceding declaration or parameter that binds it.
    pub fn static_pointee_class(&self, name: &str, before_byte: usize) -> Option<String> {
        self.bindings
            .iter()
            .filter(|b| b.name == name && b.end_byte <= before_byte)
            .max_by_key(|b| b.end_byte)
            .and_then(|b| b.class.clone())
    }

    // -------------------------------------------------------------------------
    // Index construction
    // -------------------------------------------------------------------------

    fn index_operator_decls(&mut self, tree: &Tree, source: &[u8], file: &str, is_system: bool) {
        let op_idx = OPERATOR_QUERY.capture_index_for_name("op").unwrap_or(0);
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&OPERATOR_QUERY, tree.root_node(), source);
        while let Some(m) = matches.next() {
            let Some(cap) = m.captures.iter().find(|c| c.index == op_idx) else {
                continue;
            };
            let Some(kind) = OperatorKind::from_operator_name(node_text(cap.node, source)) else {
                continue;
            };
            let Some(class) = declared_operator_class(cap.node, source) else {
                // Operator name in expression position, not a declaration.
                continue;
            };
            let decl = OverrideDecl {
                kind,
                class,
                location: location_from_node(cap.node, file),
                in_system_header: is_system,
            };
            trace!(file, kind = ?decl.kind, class = ?decl.class, "indexed operator declaration");
            self.overrides.decls.push(decl);
        }
    }

    fn collect_bindings(&mut self, tree: &Tree, source: &[u8]) {
        let decls = collect_nodes(
            tree.root_node(),
            &["declaration", "parameter_declaration"],
        );
        for decl in decls {
            let class = decl
                .child_by_field_name("type")
                .and_then(|t| normalize_type_name(node_text(t, source)));
            // A declaration may carry several declarators (`C *a, *b;`).
            for i in 0..decl.named_child_count() {
                let Some(child) = decl.named_child(i) else { continue };
                if let Some(name) = declarator_identifier(child, source) {
                    self.bindings.push(VarBinding {
                        name: name.to_string(),
                        class: class.clone(),
                        end_byte: decl.end_byte(),
                    });
                }
            }
        }
    }

    fn walk_includes(
        &mut self,
        tree: &Tree,
        source: &[u8],
        including_dir: &Path,
        config: &AllocScanConfig,
        visited: &mut HashSet<PathBuf>,
        depth: usize,
    ) {
        if depth >= config.max_include_depth {
            return;
        }
        for spec in include_specs(tree, source) {
            let Some(resolved) = resolve_include(&spec, including_dir, config) else {
                debug!(include = %spec.path, "include not resolvable; skipping");
                continue;
            };
            let canonical = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());
            if !visited.insert(canonical) {
                continue;
            }
            let bytes = match std::fs::read(&resolved) {
                Ok(b) => b,
                Err(e) => {
                    debug!(include = %resolved.display(), error = %e, "unreadable include; skipping");
                    continue;
                }
            };
            let Ok(mut parser) = cpp_parser() else { continue };
            let Some(header_tree) = parser.parse(&bytes, None) else {
                debug!(include = %resolved.display(), "include failed to parse; skipping");
                continue;
            };
            let is_system = self.is_system_path(&resolved);
            let file = resolved.display().to_string();
            self.index_operator_decls(&header_tree, &bytes, &file, is_system);
            let dir = resolved
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            self.walk_includes(&header_tree, &bytes, &dir, config, visited, depth + 1);
        }
    }
}

// =============================================================================
// Declaration-site analysis
// =============================================================================

/// Decide whether an `operator_name` node is a declaration, and attribute it
/// to its class scope.
///
/// Returns `None` when the node is not part of a function declarator (an
/// expression mention such as `::operator new(8)`); `Some(None)` for a
/// namespace/file scope replacement; `Some(Some(class))` for a class-scoped
/// operator, whether declared in-class or out-of-line (`void* C::operator
/// new(...)`).
fn declared_operator_class(node: Node, source: &[u8]) -> Option<Option<String>> {
    let parent = node.parent()?;
    let (declarator, qualified_class) = match parent.kind() {
        "function_declarator" => (parent, None),
        "qualified_identifier" => {
            let grandparent = parent.parent()?;
            if grandparent.kind() != "function_declarator" {
                return None;
            }
            let scope = parent
                .child_by_field_name("scope")
                .and_then(|s| normalize_type_name(node_text(s, source)));
            (grandparent, scope)
        }
        _ => return None,
    };
    if let Some(class) = qualified_class {
        return Some(Some(class));
    }
    // In-class declarations: walk up to the enclosing class/struct body.
    // A compound_statement on the way up means a block-scope declaration,
    // which refers to the replacement allocator, not a member.
    let mut current = declarator;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "class_specifier" | "struct_specifier" => {
                let name = parent
                    .child_by_field_name("name")
                    .and_then(|n| normalize_type_name(node_text(n, source)));
                return Some(name);
            }
            "compound_statement" => return Some(None),
            _ => {}
        }
        current = parent;
    }
    Some(None)
}

// =============================================================================
// Include resolution
// =============================================================================

struct IncludeSpec {
    path: String,
    angled: bool,
}

fn include_specs(tree: &Tree, source: &[u8]) -> Vec<IncludeSpec> {
    let path_idx = INCLUDES_QUERY.capture_index_for_name("path").unwrap_or(0);
    let mut specs = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&INCLUDES_QUERY, tree.root_node(), source);
    while let Some(m) = matches.next() {
        let Some(cap) = m.captures.iter().find(|c| c.index == path_idx) else {
            continue;
        };
        let raw = node_text(cap.node, source);
        match cap.node.kind() {
            "string_literal" => specs.push(IncludeSpec {
                path: raw.trim_matches('"').to_string(),
                angled: false,
            }),
            "system_lib_string" => specs.push(IncludeSpec {
                path: raw.trim_start_matches('<').trim_end_matches('>').to_string(),
                angled: true,
            }),
            _ => {}
        }
    }
    specs
}

fn resolve_include(
    spec: &IncludeSpec,
    including_dir: &Path,
    config: &AllocScanConfig,
) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if !spec.angled {
        candidates.push(including_dir.join(&spec.path));
    }
    for dir in &config.include_dirs {
        candidates.push(dir.join(&spec.path));
    }
    for dir in &config.system_include_dirs {
        candidates.push(dir.join(&spec.path));
    }
    candidates.into_iter().find(|c| c.is_file())
}

fn path_is_system(path: &Path, system_dirs: &[PathBuf]) -> bool {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    system_dirs.iter().any(|dir| canonical.starts_with(dir))
}
