//! End-to-end orchestration of a capture analysis run.
//!
//! [`analyze`] sequences the pipeline: ingest every snapshot, resolve
//! callstacks on demand, run the five builders, and fold the totals into the
//! final [`Report`]. The whole run is a single-threaded, synchronous batch
//! job; snapshots are consumed strictly in index order because the session
//! handle is not safe for concurrent access.

use crate::builders;
use crate::capture::{CaptureSession, ReadStatus};
use crate::ingest;
use crate::report::Report;
use crate::resolve::CallstackResolver;
use thiserror::Error;

/// Errors that abort an analysis run. Per-unit failures (a snapshot, a page
/// list, a callstack) never surface here; they are logged and skipped inside
/// the pipeline.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("capture read failed: {0}")]
    FatalRead(ReadStatus),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Run the full pipeline over an opened session and assemble the report.
pub fn analyze<S: CaptureSession>(session: &S) -> Result<Report> {
    let (accounting, pages) = ingest::ingest(session);
    let mut resolver = CallstackResolver::new();

    let call_trees = builders::build_call_trees(&accounting, &mut resolver, session);
    let functions = builders::build_function_summaries(&accounting, &mut resolver, session);
    let leaks = builders::build_leaks(&accounting, &mut resolver, session);
    let page_views = builders::build_page_views(&pages, &mut resolver, session);
    let types = builders::build_type_summaries(&accounting, &mut resolver, session);

    // Global totals sum the final merged map; leak totals cover only the
    // entries that made the emitted list.
    let total_allocations = accounting.total_count();
    let total_size = accounting.total_bytes();
    let leak_count: i64 = leaks.iter().map(|l| l.leak_count).sum();
    let leak_size: u64 = leaks.iter().map(|l| l.leak_size).sum();
    let memory_fragmentation = if total_size > 0 {
        leak_size as f64 / total_size as f64 * 100.0
    } else {
        0.0
    };

    Ok(Report {
        session_name: session.session_name().to_string(),
        total_snapshots: session.snapshot_count(),
        total_allocations,
        total_size,
        leak_count,
        leak_size,
        memory_fragmentation,
        call_trees,
        functions,
        leaks,
        page_views,
        types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::JsonCapture;
    use std::io::Cursor;

    /// Capture with 14 callstacks so the leak list truncates at 10.
    fn wide_capture() -> JsonCapture {
        let mut records = String::new();
        let mut stacks = String::new();
        for id in 1..=14u64 {
            if id > 1 {
                records.push(',');
                stacks.push(',');
            }
            records.push_str(&format!(
                r#"{{"callstack_id": {}, "bytes": {}, "count": {}}}"#,
                id,
                id * 100,
                id
            ));
            stacks.push_str(&format!(
                r#""{}": {{"symbols": ["fn_{} (f{}.cpp({}))"], "addresses": [{}]}}"#,
                id, id, id, id, id * 16
            ));
        }
        let doc = format!(
            r#"{{"session_name": "wide", "snapshots": [{{"name": "s0", "callstacks": [{}]}}], "callstacks": {{{}}}}}"#,
            records, stacks
        );
        JsonCapture::parse(Cursor::new(doc)).unwrap()
    }

    #[test]
    fn totals_cover_the_full_map() {
        let session = wide_capture();

        let report = analyze(&session).unwrap();

        // Sum over all 14 records, not over any truncated list.
        assert_eq!(report.total_allocations, (1..=14).sum::<i64>());
        assert_eq!(report.total_size, (1..=14).map(|i| i * 100).sum::<u64>());
        assert_eq!(report.total_snapshots, 1);
        assert_eq!(report.session_name, "wide");
    }

    #[test]
    fn leak_totals_cover_only_emitted_entries() {
        let session = wide_capture();

        let report = analyze(&session).unwrap();

        assert_eq!(report.leaks.len(), 10);
        // Top 10 counts are 5..=14.
        assert_eq!(report.leak_count, (5..=14).sum::<i64>());
        assert_eq!(report.leak_size, (5..=14).map(|i| i * 100).sum::<u64>());
        assert!(report.leak_count <= report.total_allocations);
        assert!(report.leak_size <= report.total_size);
    }

    #[test]
    fn fragmentation_is_leak_share_of_total() {
        let session = wide_capture();

        let report = analyze(&session).unwrap();

        let expected = report.leak_size as f64 / report.total_size as f64 * 100.0;
        assert!((report.memory_fragmentation - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_capture_produces_zeroed_report() {
        let session = JsonCapture::parse(Cursor::new(r#"{"session_name": "empty"}"#)).unwrap();

        let report = analyze(&session).unwrap();

        assert_eq!(report.total_snapshots, 0);
        assert_eq!(report.total_allocations, 0);
        assert_eq!(report.total_size, 0);
        assert_eq!(report.leak_count, 0);
        assert_eq!(report.leak_size, 0);
        assert_eq!(report.memory_fragmentation, 0.0);
        assert!(report.call_trees.is_empty());
        assert!(report.functions.is_empty());
        assert!(report.leaks.is_empty());
        assert!(report.page_views.is_empty());
        assert!(report.types.is_empty());
    }

    #[test]
    fn list_limits_hold() {
        let session = wide_capture();

        let report = analyze(&session).unwrap();

        assert_eq!(report.call_trees.len(), 10);
        assert_eq!(report.leaks.len(), 10);
        assert_eq!(report.functions.len(), 14);
        assert!(report.types.len() <= 15);
    }

    #[test]
    fn overwrite_regression_end_to_end() {
        let input = r#"{
            "session_name": "regress",
            "snapshots": [
                {"name": "s0", "callstacks": [{"callstack_id": 5, "bytes": 1024, "count": 2}]},
                {"name": "s1", "callstacks": [{"callstack_id": 5, "bytes": 2048, "count": 4}]}
            ]
        }"#;
        let session = JsonCapture::parse(Cursor::new(input)).unwrap();

        let report = analyze(&session).unwrap();

        // The later snapshot's record wins outright; values are not summed.
        assert_eq!(report.total_snapshots, 2);
        assert_eq!(report.total_allocations, 4);
        assert_eq!(report.total_size, 2048);
        assert_eq!(report.functions[0].total_size, 2048);
        assert_eq!(report.leaks[0].leak_count, 4);
    }

    #[test]
    fn report_is_deterministic() {
        let session = wide_capture();

        let first = analyze(&session).unwrap();
        let second = analyze(&session).unwrap();

        assert_eq!(first, second);
    }
}
