//! allocscan CLI - find global operator new/delete usage in C++ sources.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use allocscan::analysis::{scan_files, AllocScanConfig};

/// Find global use of allocation/deallocation operators.
#[derive(Parser)]
#[command(
    name = "allocscan",
    version,
    about = "Find global operator new/delete usage in C++ sources",
    after_help = "\
This is a tool for finding global use of operator new/delete (from either
the global allocator or from the standard library). Allocation sites that
resolve to user-defined overrides are not reported.

Compiler flags after `--` are accepted; -I<dir> and -isystem <dir> are
honored for include resolution, everything else is ignored."
)]
struct Cli {
    /// C++ source files to scan, processed in list order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Add a user include search directory
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Add a system include directory (headers there are exempt from the audit)
    #[arg(long = "isystem", value_name = "DIR")]
    system_dirs: Vec<PathBuf>,

    /// Do not use the built-in system include directories
    #[arg(long)]
    no_default_system_dirs: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Raw compiler flags (after --)
    #[arg(last = true, value_name = "COMPILER-FLAGS")]
    compiler_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli);
    let outcome = scan_files(&cli.files, &config);

    match cli.format {
        OutputFormat::Text => {
            for diag in outcome.engine.rendered() {
                println!("{}", diag.to_line());
            }
            for failure in &outcome.failures {
                eprintln!("{}: {}", failure.file, failure.message);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome.to_report())?);
        }
    }

    let exit_code = outcome.exit_code();
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn build_config(cli: &Cli) -> AllocScanConfig {
    let mut config = if cli.no_default_system_dirs {
        AllocScanConfig::bare()
    } else {
        AllocScanConfig::default()
    };
    config.include_dirs.extend(cli.include_dirs.iter().cloned());
    config
        .system_include_dirs
        .extend(cli.system_dirs.iter().cloned());

    // Harvest -I / -isystem from raw compiler flags; ignore the rest.
    let mut args = cli.compiler_args.iter();
    while let Some(arg) = args.next() {
        if let Some(rest) = arg.strip_prefix("-I") {
            if rest.is_empty() {
                if let Some(dir) = args.next() {
                    config.include_dirs.push(PathBuf::from(dir));
                }
            } else {
                config.include_dirs.push(PathBuf::from(rest));
            }
        } else if let Some(rest) = arg.strip_prefix("-isystem") {
            if rest.is_empty() {
                if let Some(dir) = args.next() {
                    config.system_include_dirs.push(PathBuf::from(dir));
                }
            } else {
                config.system_include_dirs.push(PathBuf::from(rest));
            }
        }
    }
    config
}
