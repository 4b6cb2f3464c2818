//! allocscan - find global `operator new`/`operator delete` usage in C++.
//!
//! A minimal static-analysis probe: it scans C++ translation units for
//! dynamic allocation and deallocation expressions and reports, as
//! compiler-style diagnostics, every site that routes through the
//! process-global allocator or through a library-provided allocator shipped
//! in a system header. Sites that resolve to user-defined overrides stay
//! silent; that is the case the tool exists to distinguish.
//!
//! # Architecture
//!
//! - **Language layer** ([`lang`]): the tree-sitter C++ front end.
//! - **Analysis layer** ([`analysis`]): matcher queries, the per-unit
//!   semantic context (override index, include resolution, system-path
//!   test), and the classification policy.
//! - **Diagnostics** ([`diagnostics`]): template registry plus the queue of
//!   reported records, rendered `file:line:column: severity: message`.
//!
//! # Quick Start
//!
//! ```no_run
//! use allocscan::analysis::{scan_files, AllocScanConfig};
//!
//! let config = AllocScanConfig::default();
//! let outcome = scan_files(&["src/main.cpp".into()], &config);
//! for diag in outcome.engine.rendered() {
//!     println!("{}", diag.to_line());
//! }
//! std::process::exit(outcome.exit_code());
//! ```

pub mod analysis;
pub mod diagnostics;
pub mod error;
pub mod lang;

pub use analysis::{scan_file, scan_files, AllocScanConfig, ScanOutcome, ScanReport};
pub use diagnostics::{DiagnosticsEngine, Severity};
pub use error::{AllocScanError, Result};
