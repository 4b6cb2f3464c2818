//! Shared helper functions for the allocation analysis.

use phf::phf_set;
use tree_sitter::Node;

use super::types::SourceLocation;

/// Builtin and fundamental type names that can never carry a class-scoped
/// allocation operator. Compile-time perfect hashing for O(1) lookup.
static BUILTIN_TYPE_NAMES: phf::Set<&'static str> = phf_set! {
    "void", "bool", "char", "signed", "unsigned", "short", "int", "long",
    "float", "double", "auto", "wchar_t", "char8_t", "char16_t", "char32_t",
    "size_t", "ssize_t", "ptrdiff_t", "intptr_t", "uintptr_t",
    "int8_t", "int16_t", "int32_t", "int64_t",
    "uint8_t", "uint16_t", "uint32_t", "uint64_t",
};

/// Get text content of a tree-sitter node.
pub(super) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    std::str::from_utf8(&source[node.start_byte()..node.end_byte()]).unwrap_or("")
}

/// Build a SourceLocation from a tree-sitter node.
pub(super) fn location_from_node(node: Node, file_path: &str) -> SourceLocation {
    SourceLocation::new(
        file_path,
        node.start_position().row + 1,
        node.start_position().column + 1,
        node.end_position().row + 1,
        node.end_position().column + 1,
    )
}

/// Collect all AST nodes matching any of the given kinds, in document order.
pub(super) fn collect_nodes<'a>(node: Node<'a>, kinds: &[&str]) -> Vec<Node<'a>> {
    let mut results = Vec::new();
    collect_nodes_inner(node, kinds, &mut results);
    results
}

fn collect_nodes_inner<'a>(node: Node<'a>, kinds: &[&str], out: &mut Vec<Node<'a>>) {
    if kinds.contains(&node.kind()) {
        out.push(node);
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_nodes_inner(child, kinds, out);
        }
    }
}

/// Reduce a spelled type to the bare class name usable for override lookup.
///
/// Strips cv-qualifiers and elaborated-type keywords, template argument
/// lists, and namespace qualification. Returns `None` for builtin types and
/// anything that cannot name a class.
pub(super) fn normalize_type_name(spelled: &str) -> Option<String> {
    let mut text = spelled.trim();
    loop {
        let stripped = text
            .strip_prefix("const ")
            .or_else(|| text.strip_prefix("volatile "))
            .or_else(|| text.strip_prefix("struct "))
            .or_else(|| text.strip_prefix("class "))
            .or_else(|| text.strip_prefix("typename "));
        match stripped {
            Some(rest) => text = rest.trim_start(),
            None => break,
        }
    }
    if let Some(pos) = text.find('<') {
        text = &text[..pos];
    }
    if let Some(pos) = text.rfind("::") {
        text = &text[pos + 2..];
    }
    let text = text.trim();
    if text.is_empty() || BUILTIN_TYPE_NAMES.contains(text) {
        return None;
    }
    // Multi-token spellings left over at this point ("unsigned long" etc.)
    // are fundamental types too.
    if text.contains(' ') {
        return None;
    }
    Some(text.to_string())
}

/// Find the identifier bound by a declarator, walking through pointer,
/// reference, array, init and parenthesized declarator wrappers.
pub(super) fn declarator_identifier<'a>(node: Node<'a>, source: &'a [u8]) -> Option<&'a str> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(node_text(node, source)),
        "init_declarator"
        | "pointer_declarator"
        | "reference_declarator"
        | "array_declarator"
        | "parenthesized_declarator"
        | "function_declarator" => {
            // reference_declarator has no named "declarator" field; fall back
            // to scanning children.
            if let Some(inner) = node.child_by_field_name("declarator") {
                return declarator_identifier(inner, source);
            }
            for i in 0..node.named_child_count() {
                if let Some(child) = node.named_child(i) {
                    if let Some(name) = declarator_identifier(child, source) {
                        return Some(name);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_type_name() {
        assert_eq!(normalize_type_name("Widget"), Some("Widget".to_string()));
        assert_eq!(normalize_type_name("const Widget"), Some("Widget".to_string()));
        assert_eq!(normalize_type_name("ns::Widget"), Some("Widget".to_string()));
        assert_eq!(normalize_type_name("Box<int>"), Some("Box".to_string()));
        assert_eq!(
            normalize_type_name("const ns::Box<ns::T>"),
            Some("Box".to_string())
        );
        assert_eq!(normalize_type_name("int"), None);
        assert_eq!(normalize_type_name("unsigned long"), None);
        assert_eq!(normalize_type_name(""), None);
    }
}
