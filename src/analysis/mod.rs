//! Allocation-provenance analysis.
//!
//! Scans C++ translation units for dynamic allocation/deallocation
//! expressions and reports each one that routes through the process-global
//! allocator or through a library-provided allocator shipped in a system
//! header. User-defined overrides are the allowed case and stay silent.
//!
//! Pipeline per file: parse, build the [`resolve::SemanticContext`], collect
//! sites with [`matcher`], classify each independently with `classify`.
//! Nothing accumulates across matches or across files.

mod classify;
mod helpers;
pub mod matcher;
pub mod resolve;
pub mod types;


use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diagnostics::{DiagnosticsEngine, RenderedDiagnostic};
use crate::error::{AllocScanError, Result};
use crate::lang::{cpp_parser, is_cpp_file};

pub use classify::PendingDiagnostic;
pub use types::*;

/// Result of scanning a list of input files.
///
/// The diagnostics engine is owned here; diagnostics were merged into it in
/// command-line list order, so rendering preserves input order.
pub struct ScanOutcome {
    pub engine: DiagnosticsEngine,
    pub files_scanned: usize,
    pub failures: Vec<ScanFailure>,
}

impl ScanOutcome {
    /// Process exit code: failures to read or parse an input are the only
    /// thing that makes the run non-zero. Allocation diagnostics themselves
    /// never do.
    pub fn exit_code(&self) -> i32 {
        if self.failures.is_empty() {
            0
        } else {
            1
        }
    }

    /// Flatten to the serializable report form.
    pub fn to_report(&self) -> ScanReport {
        ScanReport {
            diagnostics: self.engine.rendered(),
            files_scanned: self.files_scanned,
            failures: self.failures.clone(),
        }
    }
}

/// Serializable scan report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub diagnostics: Vec<RenderedDiagnostic>,
    pub files_scanned: usize,
    pub failures: Vec<ScanFailure>,
}

/// Scan input files and merge every file's diagnostics into one engine.
///
/// Files are parsed and classified in parallel; classification is stateless
/// and reentrant, so this only reorders work, not output. A file that fails
/// to read or parse is skipped and recorded; remaining files still scan.
pub fn scan_files(files: &[PathBuf], config: &AllocScanConfig) -> ScanOutcome {
    let results: Vec<Result<Vec<PendingDiagnostic>>> =
        files.par_iter().map(|f| scan_file(f, config)).collect();

    let mut engine = DiagnosticsEngine::new();
    let mut failures = Vec::new();
    let mut files_scanned = 0;
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(pending) => {
                files_scanned += 1;
                debug!(file = %file.display(), diagnostics = pending.len(), "scanned");
                for p in pending {
                    let id = engine.custom_id(p.severity, p.template);
                    engine.report(p.location, id, p.args);
                }
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping input file");
                failures.push(ScanFailure {
                    file: file.display().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    ScanOutcome {
        engine,
        files_scanned,
        failures,
    }
}

/// Scan a single translation unit.
pub fn scan_file(path: &Path, config: &AllocScanConfig) -> Result<Vec<PendingDiagnostic>> {
    if !is_cpp_file(path) {
        return Err(AllocScanError::NotCpp(path.display().to_string()));
    }
    let source = std::fs::read(path).map_err(|e| AllocScanError::io_with_path(e, path))?;

    let mut parser = cpp_parser()?;
    let tree = parser
        .parse(&source, None)
        .ok_or_else(|| AllocScanError::Parse {
            file: path.display().to_string(),
            message: "Failed to parse file".to_string(),
        })?;

    let ctx = resolve::SemanticContext::build(path, &tree, &source, config);
    let sites = matcher::collect_sites(&tree, &source);

    let mut pending = Vec::new();
    for site in &sites {
        if let Some(diag) = classify::classify(site, &ctx) {
            pending.push(diag);
        }
    }
    Ok(pending)
}
