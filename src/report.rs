//! Report data model and JSON emission.
//!
//! The report is the aggregate root of a run: headline totals plus the five
//! derived lists, created once, immutable after construction, and serialized
//! as a single camelCase JSON document.

use serde::Serialize;
use std::io::Write;

/// Full analysis result for one capture.
///
/// `leak_count`/`leak_size` sum only the emitted leak entries, so both are at
/// most the global totals taken over the full accounting map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub session_name: String,
    pub total_snapshots: usize,
    pub total_allocations: i64,
    pub total_size: u64,
    pub leak_count: i64,
    pub leak_size: u64,
    /// Sampled leak bytes over total tracked bytes, as a percentage.
    /// Unclamped; zero when nothing is tracked.
    pub memory_fragmentation: f64,
    pub call_trees: Vec<CallTreeNode>,
    pub functions: Vec<FunctionEntry>,
    pub leaks: Vec<LeakEntry>,
    pub page_views: Vec<PageViewEntry>,
    pub types: Vec<TypeEntry>,
}

impl Report {
    /// Serialize as pretty-printed JSON with a trailing newline.
    pub fn write_json<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self).map_err(std::io::Error::from)?;
        writeln!(writer)
    }
}

/// One node of a top-allocator call tree. The accounting model does not
/// distinguish self from inclusive cost, so the three sizes coincide on
/// every root.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTreeNode {
    pub function_name: String,
    pub file_name: String,
    pub line_number: u32,
    pub allocation_count: i64,
    pub total_size: u64,
    pub self_size: u64,
    pub inclusive_size: u64,
    pub children: Vec<CallTreeNode>,
}

/// Per-function summary line. `min_size` and `max_size` equal
/// `average_size`: the capture carries no per-allocation distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEntry {
    pub function_name: String,
    pub file_name: String,
    pub line_number: u32,
    pub allocation_count: i64,
    pub total_size: u64,
    pub average_size: u64,
    pub min_size: u64,
    pub max_size: u64,
    pub percentage: f64,
}

/// A leak candidate: one of the highest-count callstacks, scored for
/// display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakEntry {
    pub function_name: String,
    pub file_name: String,
    pub line_number: u32,
    pub leak_size: u64,
    pub leak_count: i64,
    pub leak_score: f64,
    /// Addresses in stored (innermost-first) order, joined by `" <- "`.
    pub call_stack: String,
    pub is_suspect: bool,
}

/// One of the most-used pages, with the function owning its first sampled
/// allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewEntry {
    pub address: String,
    pub state: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub protection: String,
    pub stack_id: u64,
    pub usage: u64,
    pub allocation_count: i64,
    pub total_size: u64,
    pub function_name: String,
    pub call_stack: String,
}

/// Per-type summary line, grouped by the coarse type-name heuristic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeEntry {
    pub type_name: String,
    pub allocation_count: i64,
    pub total_size: u64,
    pub average_size: u64,
    pub min_size: u64,
    pub max_size: u64,
    pub percentage: f64,
    pub most_common_function: String,
    pub most_common_file: String,
    pub most_common_line: u32,
}

/// Human-readable byte count with one decimal place.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}
