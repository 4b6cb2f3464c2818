//! Classification/Reporting component.
//!
//! Given one matched site, decide whether a diagnostic is due and what it
//! should say. Stateless: each invocation inspects exactly one site against
//! the per-unit semantic context and returns at most one pending diagnostic.
//! Holding no reference to the diagnostics engine keeps per-file
//! classification freely parallelizable; the driver registers and queues the
//! result.

use crate::diagnostics::{
    Severity, TPL_GLOBAL_DELETE, TPL_GLOBAL_NEW, TPL_LIBRARY_DELETE, TPL_LIBRARY_NEW,
};

use super::matcher::{AllocSite, AllocationSite, DeallocationSite};
use super::resolve::{OperatorKind, OverrideDecl, SemanticContext};
use super::types::SourceLocation;

/// A decided diagnostic, not yet registered with an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDiagnostic {
    pub severity: Severity,
    pub template: &'static str,
    pub location: SourceLocation,
    pub args: Vec<String>,
}

/// How a site's allocation function resolved.
enum Resolution<'a> {
    /// The process-global allocator: explicit `::` qualification, or no
    /// applicable override (including every resolution-ambiguity case).
    Global,
    /// A named override declared somewhere the index can point at.
    Override(&'a OverrideDecl),
}

/// Classify one matched site. Returns the diagnostic to report, or `None`
/// when policy suppresses the site.
pub fn classify(site: &AllocSite, ctx: &SemanticContext) -> Option<PendingDiagnostic> {
    // Matches inside system-provided code are never reported: the tool
    // audits user code, not standard-library internals.
    if ctx.file_is_system {
        return None;
    }
    let location = site.location(&ctx.file);
    match site {
        AllocSite::Allocation(alloc) => classify_allocation(alloc, ctx, &location),
        AllocSite::Deallocation(dealloc) => classify_deallocation(dealloc, ctx, &location),
    }
}

fn classify_allocation(
    site: &AllocationSite,
    ctx: &SemanticContext,
    location: &SourceLocation,
) -> Option<PendingDiagnostic> {
    // Placement allocation performs no memory acquisition; out of scope.
    if site.placement {
        return None;
    }
    let kind = if site.array {
        OperatorKind::NewArray
    } else {
        OperatorKind::New
    };
    let resolution = resolve(
        site.scope_qualified,
        site.allocated_class.as_deref(),
        kind,
        ctx,
    );
    decide(
        resolution,
        site.array,
        location,
        TPL_GLOBAL_NEW,
        TPL_LIBRARY_NEW,
    )
}

fn classify_deallocation(
    site: &DeallocationSite,
    ctx: &SemanticContext,
    location: &SourceLocation,
) -> Option<PendingDiagnostic> {
    let kind = if site.array {
        OperatorKind::DeleteArray
    } else {
        OperatorKind::Delete
    };
    let pointee = site
        .operand
        .as_deref()
        .and_then(|name| ctx.static_pointee_class(name, site.node.start_byte()));
    let resolution = resolve(site.scope_qualified, pointee.as_deref(), kind, ctx);
    decide(
        resolution,
        site.array,
        location,
        TPL_GLOBAL_DELETE,
        TPL_LIBRARY_DELETE,
    )
}

/// Resolve which operator function a site binds to.
///
/// An explicit `::` qualifier bypasses every override. Otherwise class scope
/// is consulted first, then namespace/file scope replacements; when neither
/// yields a declaration the site is global. A class name that never resolved
/// (ambiguity) lands in the same global branch by construction.
fn resolve<'a>(
    scope_qualified: bool,
    class: Option<&str>,
    kind: OperatorKind,
    ctx: &'a SemanticContext,
) -> Resolution<'a> {
    if scope_qualified {
        return Resolution::Global;
    }
    if let Some(class) = class {
        if let Some(decl) = ctx.class_override(class, kind) {
            return Resolution::Override(decl);
        }
    }
    match ctx.replacement_override(kind) {
        Some(decl) => Resolution::Override(decl),
        None => Resolution::Global,
    }
}

fn decide(
    resolution: Resolution,
    array: bool,
    location: &SourceLocation,
    global_template: &'static str,
    library_template: &'static str,
) -> Option<PendingDiagnostic> {
    let suffix = if array { "[]" } else { "" };
    match resolution {
        Resolution::Global => Some(PendingDiagnostic {
            severity: Severity::Error,
            template: global_template,
            location: location.clone(),
            args: vec![suffix.to_string()],
        }),
        Resolution::Override(decl) if decl.in_system_header => Some(PendingDiagnostic {
            severity: Severity::Error,
            template: library_template,
            location: location.clone(),
            args: vec![suffix.to_string(), decl.location.to_string()],
        }),
        // User-defined override outside any system header: the allowed case
        // this tool exists to distinguish from the two reportable ones.
        Resolution::Override(_) => None,
    }
}
