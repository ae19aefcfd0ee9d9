//! Analyze a memory capture and write a JSON report next to it.
//!
//! Reads a capture file, merges every snapshot's accounting records, runs the
//! report builders, and writes `<input-stem>_memory_analysis.json` alongside
//! the input. Progress is narrated on stdout; skipped units are reported on
//! stderr.
//!
//! # Usage
//!
//! ```bash
//! memcap session.mcap
//! # writes session_memory_analysis.json
//! ```

use clap::Parser;
use memcap::analysis::{self, AnalysisError};
use memcap::capture::{CaptureSession, JsonCapture};
use memcap::report::format_bytes;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "memcap")]
#[command(about = "Analyze a memory capture file")]
#[command(version)]
struct Args {
    /// Capture file to analyze
    capture: PathBuf,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if !args.capture.exists() {
        eprintln!("capture file not found: {}", args.capture.display());
        eprintln!("usage: memcap <capture-file>");
        return Err("missing input file".into());
    }

    println!("Reading capture: {}", args.capture.display());
    let mut session = JsonCapture::new();
    let status = session.read(&args.capture);
    if !status.is_ok() {
        return Err(AnalysisError::FatalRead(status).into());
    }

    if let Some(warning) = session.load_symbol_files() {
        eprintln!("warning: {}", warning);
    }

    println!("Session: {}", session.session_name());
    println!("Snapshots: {}", session.snapshot_count());
    for index in 0..session.snapshot_count() {
        if let Ok(snapshot) = session.snapshot(index) {
            println!(
                "  [{}] {}: {} allocated, {} committed, {} reserved",
                index,
                snapshot.name,
                format_bytes(snapshot.allocated_bytes),
                format_bytes(snapshot.committed_bytes),
                format_bytes(snapshot.reserved_bytes),
            );
        }
    }

    println!("Analyzing...");
    let report = analysis::analyze(&session)?;

    println!(
        "  {} allocations, {} tracked",
        report.total_allocations,
        format_bytes(report.total_size)
    );
    println!(
        "  {} leak candidates holding {} ({:.1}% fragmentation)",
        report.leaks.len(),
        format_bytes(report.leak_size),
        report.memory_fragmentation
    );
    println!(
        "  {} call trees, {} functions, {} page views, {} types",
        report.call_trees.len(),
        report.functions.len(),
        report.page_views.len(),
        report.types.len()
    );

    let output_path = output_path(&args.capture);
    let file = File::create(&output_path)?;
    report.write_json(BufWriter::new(file))?;
    println!("Wrote report to {}", output_path.display());

    Ok(())
}

/// `<input-stem>_memory_analysis.json`, in the input's directory.
fn output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("capture");
    input.with_file_name(format!("{}_memory_analysis.json", stem))
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
