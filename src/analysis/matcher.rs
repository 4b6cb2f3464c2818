//! Matcher component: tree-pattern queries for dynamic allocation and
//! deallocation expressions.
//!
//! Two queries, declared once and compiled lazily, each binding its match
//! under a named capture. For every `new_expression` (resp.
//! `delete_expression`) anywhere in a parsed translation unit the pattern
//! fires exactly once; sites come back in document order of a depth-first
//! walk. Pure tree predicates, no side effects.

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor, Tree};

use super::helpers::{location_from_node, node_text, normalize_type_name};
use super::types::SourceLocation;

/// Find `new` expressions.
const NEW_EXPR_QUERY: &str = "(new_expression) @use_new";

/// Find `delete` expressions.
const DELETE_EXPR_QUERY: &str = "(delete_expression) @use_delete";

static NEW_QUERY: Lazy<Query> = Lazy::new(|| {
    Query::new(&tree_sitter_cpp::LANGUAGE.into(), NEW_EXPR_QUERY)
        .expect("Invalid new_expression query")
});

static DELETE_QUERY: Lazy<Query> = Lazy::new(|| {
    Query::new(&tree_sitter_cpp::LANGUAGE.into(), DELETE_EXPR_QUERY)
        .expect("Invalid delete_expression query")
});

/// One matched dynamic-allocation expression.
#[derive(Debug, Clone)]
pub struct AllocationSite<'a> {
    pub node: Node<'a>,
    /// `new T[n]` rather than `new T`.
    pub array: bool,
    /// Placement arguments present (`new (buf) T`, `new (std::nothrow) T`).
    pub placement: bool,
    /// Spelled with an explicit global scope qualifier (`::new`).
    pub scope_qualified: bool,
    /// Bare class name of the allocated type, when it can name a class.
    pub allocated_class: Option<String>,
}

/// One matched dynamic-deallocation expression.
#[derive(Debug, Clone)]
pub struct DeallocationSite<'a> {
    pub node: Node<'a>,
    /// `delete[] p` rather than `delete p`.
    pub array: bool,
    /// Spelled with an explicit global scope qualifier (`::delete`).
    pub scope_qualified: bool,
    /// Operand identifier, when the operand is a plain identifier.
    pub operand: Option<String>,
}

/// A matched node, tagged by which capture fired.
///
/// Valid only while the parsed tree is alive; classification consumes one
/// site per invocation and keeps no reference past its return.
#[derive(Debug, Clone)]
pub enum AllocSite<'a> {
    Allocation(AllocationSite<'a>),
    Deallocation(DeallocationSite<'a>),
}

impl AllocSite<'_> {
    /// Location of the expression itself.
    pub fn location(&self, file: &str) -> SourceLocation {
        match self {
            AllocSite::Allocation(s) => location_from_node(s.node, file),
            AllocSite::Deallocation(s) => location_from_node(s.node, file),
        }
    }

    fn start_byte(&self) -> usize {
        match self {
            AllocSite::Allocation(s) => s.node.start_byte(),
            AllocSite::Deallocation(s) => s.node.start_byte(),
        }
    }
}

/// Run both pattern queries over a parsed translation unit.
pub fn collect_sites<'a>(tree: &'a Tree, source: &[u8]) -> Vec<AllocSite<'a>> {
    let mut sites = Vec::new();

    let new_idx = NEW_QUERY.capture_index_for_name("use_new").unwrap_or(0);
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&NEW_QUERY, tree.root_node(), source);
    while let Some(m) = matches.next() {
        if let Some(cap) = m.captures.iter().find(|c| c.index == new_idx) {
            sites.push(AllocSite::Allocation(extract_allocation(cap.node, source)));
        }
    }

    let delete_idx = DELETE_QUERY
        .capture_index_for_name("use_delete")
        .unwrap_or(0);
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&DELETE_QUERY, tree.root_node(), source);
    while let Some(m) = matches.next() {
        if let Some(cap) = m.captures.iter().find(|c| c.index == delete_idx) {
            sites.push(AllocSite::Deallocation(extract_deallocation(
                cap.node, source,
            )));
        }
    }

    // Interleave allocations and deallocations into document order.
    sites.sort_by_key(|s| s.start_byte());
    sites
}

fn extract_allocation<'a>(node: Node<'a>, source: &[u8]) -> AllocationSite<'a> {
    let placement = node.child_by_field_name("placement").is_some();
    // The grammar attaches `[n]` as a new_declarator under the declarator field.
    let array = node.child_by_field_name("declarator").is_some();
    let scope_qualified = node.child(0).map_or(false, |c| c.kind() == "::");
    let allocated_class = node
        .child_by_field_name("type")
        .and_then(|t| normalize_type_name(node_text(t, source)));
    AllocationSite {
        node,
        array,
        placement,
        scope_qualified,
        allocated_class,
    }
}

fn extract_deallocation<'a>(node: Node<'a>, source: &[u8]) -> DeallocationSite<'a> {
    let mut array = false;
    let mut scope_qualified = false;
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            match child.kind() {
                "[" => array = true,
                "::" if i == 0 => scope_qualified = true,
                _ => {}
            }
        }
    }
    // The operand is the last named child; only a plain identifier gives the
    // resolver something to recover a static type from.
    let operand = node
        .named_child_count()
        .checked_sub(1)
        .and_then(|i| node.named_child(i))
        .filter(|n| n.kind() == "identifier")
        .map(|n| node_text(n, source).to_string());
    DeallocationSite {
        node,
        array,
        scope_qualified,
        operand,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::cpp_parser;

    fn sites_of(code: &str) -> (tree_sitter::Tree, Vec<u8>) {
        let mut parser = cpp_parser().unwrap();
        let tree = parser.parse(code.as_bytes(), None).unwrap();
        (tree, code.as_bytes().to_vec())
    }

    #[test]
    fn test_scalar_new_flags() {
        let (tree, src) = sites_of("void f() { int* p = new int; }");
        let sites = collect_sites(&tree, &src);
        assert_eq!(sites.len(), 1);
        match &sites[0] {
            AllocSite::Allocation(s) => {
                assert!(!s.array);
                assert!(!s.placement);
                assert!(!s.scope_qualified);
                assert!(s.allocated_class.is_none());
            }
            _ => panic!("expected allocation"),
        }
    }

    #[test]
    fn test_array_new_and_class_type() {
        let (tree, src) = sites_of("void f() { Widget* p = new Widget[5]; }");
        let sites = collect_sites(&tree, &src);
        match &sites[0] {
            AllocSite::Allocation(s) => {
                assert!(s.array);
                assert_eq!(s.allocated_class.as_deref(), Some("Widget"));
            }
            _ => panic!("expected allocation"),
        }
    }

    #[test]
    fn test_placement_new() {
        let (tree, src) = sites_of("void f(void* buf) { new (buf) int; }");
        let sites = collect_sites(&tree, &src);
        match &sites[0] {
            AllocSite::Allocation(s) => assert!(s.placement),
            _ => panic!("expected allocation"),
        }
    }

    #[test]
    fn test_scope_qualified_new_and_delete() {
        let (tree, src) = sites_of("void f(int* p) { p = ::new int; ::delete p; }");
        let sites = collect_sites(&tree, &src);
        assert_eq!(sites.len(), 2);
        match &sites[0] {
            AllocSite::Allocation(s) => assert!(s.scope_qualified),
            _ => panic!("expected allocation first"),
        }
        match &sites[1] {
            AllocSite::Deallocation(s) => {
                assert!(s.scope_qualified);
                assert_eq!(s.operand.as_deref(), Some("p"));
            }
            _ => panic!("expected deallocation second"),
        }
    }

    #[test]
    fn test_array_delete() {
        let (tree, src) = sites_of("void f(int* p) { delete[] p; }");
        let sites = collect_sites(&tree, &src);
        match &sites[0] {
            AllocSite::Deallocation(s) => {
                assert!(s.array);
                assert!(!s.scope_qualified);
            }
            _ => panic!("expected deallocation"),
        }
    }

    #[test]
    fn test_document_order_is_interleaved() {
        let (tree, src) = sites_of(
            "void f() { int* a = new int; delete a; int* b = new int[2]; delete[] b; }",
        );
        let sites = collect_sites(&tree, &src);
        assert_eq!(sites.len(), 4);
        assert!(matches!(sites[0], AllocSite::Allocation(_)));
        assert!(matches!(sites[1], AllocSite::Deallocation(_)));
        assert!(matches!(sites[2], AllocSite::Allocation(_)));
        assert!(matches!(sites[3], AllocSite::Deallocation(_)));
    }

    #[test]
    fn test_explicit_operator_call_is_not_a_site() {
        // `::operator new(8)` is a plain call expression, not a new-expression.
        let (tree, src) = sites_of("void f() { void* p = ::operator new(8); }");
        assert!(collect_sites(&tree, &src).is_empty());
    }
}
