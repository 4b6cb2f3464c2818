//! Diagnostics engine for allocscan.
//!
//! A small, explicit stand-in for a compiler diagnostics subsystem: message
//! templates are registered once and handed back a stable [`DiagId`], reported
//! diagnostics are queued against a template plus positional arguments, and
//! rendering substitutes `%0`..`%9` and prints the conventional
//! `file:line:column: severity: message` line. The engine is plain owned
//! state, passed explicitly wherever diagnostics are produced.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analysis::types::SourceLocation;

// =============================================================================
// Message templates
// =============================================================================

/// Scalar or array `new` routed to the process-global allocator.
pub const TPL_GLOBAL_NEW: &str = "Using global `::operator new%0()`";

/// `new` routed to an allocator declared in a system-provided header.
pub const TPL_LIBRARY_NEW: &str = "Using `operator new%0()` from %1";

/// Scalar or array `delete` routed to the process-global deallocator.
pub const TPL_GLOBAL_DELETE: &str = "Using global `::operator delete%0()`";

/// `delete` routed to a deallocator declared in a system-provided header.
pub const TPL_LIBRARY_DELETE: &str = "Using `operator delete%0()` from %1";

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity tier.
///
/// The allocation probe registers everything at [`Severity::Error`] purely so
/// the messages reach the default output stream regardless of verbosity; it is
/// not a correctness judgment on the scanned code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Stable identifier for a registered message template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagId(u32);

/// One reported diagnostic: a template reference plus substitution arguments.
///
/// Records are owned by the engine and outlive the classification call that
/// produced them; they are rendered only when output is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub id: DiagId,
    pub location: SourceLocation,
    pub args: Vec<String>,
}

/// A diagnostic flattened to printable form, for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedDiagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub message: String,
}

impl RenderedDiagnostic {
    /// The conventional one-line compiler form.
    pub fn to_line(&self) -> String {
        format!(
            "{}:{}:{}: {}: {}",
            self.file, self.line, self.column, self.severity, self.message
        )
    }
}

struct Template {
    text: String,
    severity: Severity,
}

/// Registry of message templates plus the queue of reported diagnostics.
#[derive(Default)]
pub struct DiagnosticsEngine {
    templates: Vec<Template>,
    ids: HashMap<String, DiagId>,
    reported: Vec<Diagnostic>,
}

impl DiagnosticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the stable id for a template, registering it on first use.
    ///
    /// Registering the same template text twice returns the same id; the
    /// severity recorded at first registration wins.
    pub fn custom_id(&mut self, severity: Severity, template: &str) -> DiagId {
        if let Some(id) = self.ids.get(template) {
            return *id;
        }
        let id = DiagId(self.templates.len() as u32);
        self.templates.push(Template {
            text: template.to_string(),
            severity,
        });
        self.ids.insert(template.to_string(), id);
        id
    }

    /// Queue one diagnostic at a location with positional arguments.
    pub fn report(&mut self, location: SourceLocation, id: DiagId, args: Vec<String>) {
        self.reported.push(Diagnostic { id, location, args });
    }

    /// All queued diagnostics, in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.reported
    }

    /// Substitute `%0`..`%9` in a diagnostic's template.
    ///
    /// A placeholder with no corresponding argument substitutes to nothing.
    pub fn format_message(&self, diag: &Diagnostic) -> String {
        let template = &self.templates[diag.id.0 as usize].text;
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '%' {
                if let Some(d) = chars.peek().and_then(|p| p.to_digit(10)) {
                    chars.next();
                    if let Some(arg) = diag.args.get(d as usize) {
                        out.push_str(arg);
                    }
                    continue;
                }
            }
            out.push(c);
        }
        out
    }

    /// Flatten all queued diagnostics to printable form.
    pub fn rendered(&self) -> Vec<RenderedDiagnostic> {
        self.reported
            .iter()
            .map(|d| RenderedDiagnostic {
                file: d.location.file.clone(),
                line: d.location.line,
                column: d.location.column,
                severity: self.templates[d.id.0 as usize].severity,
                message: self.format_message(d),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_id_is_stable_per_template() {
        let mut engine = DiagnosticsEngine::new();
        let a = engine.custom_id(Severity::Error, TPL_GLOBAL_NEW);
        let b = engine.custom_id(Severity::Error, TPL_LIBRARY_NEW);
        let a2 = engine.custom_id(Severity::Error, TPL_GLOBAL_NEW);
        assert_eq!(a, a2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_format_substitutes_positional_args() {
        let mut engine = DiagnosticsEngine::new();
        let id = engine.custom_id(Severity::Error, TPL_LIBRARY_NEW);
        engine.report(
            SourceLocation::point("a.cpp", 3, 5),
            id,
            vec!["[]".to_string(), "/sys/new.h:10:7".to_string()],
        );
        let rendered = engine.rendered();
        assert_eq!(
            rendered[0].message,
            "Using `operator new[]()` from /sys/new.h:10:7"
        );
        assert_eq!(
            rendered[0].to_line(),
            "a.cpp:3:5: error: Using `operator new[]()` from /sys/new.h:10:7"
        );
    }

    #[test]
    fn test_missing_arg_substitutes_empty() {
        let mut engine = DiagnosticsEngine::new();
        let id = engine.custom_id(Severity::Error, TPL_GLOBAL_NEW);
        engine.report(SourceLocation::point("a.cpp", 1, 1), id, vec![]);
        assert_eq!(
            engine.rendered()[0].message,
            "Using global `::operator new()`"
        );
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Error.to_string(), "error");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Note.to_string(), "note");
    }
}
