//! Capture-session data model and decoder interface.
//!
//! The analysis engine consumes a [`CaptureSession`]: an ordered sequence of
//! snapshots, each carrying per-callstack counters and a page list, plus a
//! table of resolvable callstacks. [`JsonCapture`] is the bundled decoder for
//! JSON capture documents; binary decoders can plug in behind the same trait.
//!
//! Every fetch is fallible per unit — per snapshot, per page list, per
//! callstack — and the engine degrades gracefully around each failure rather
//! than aborting the run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by capture sessions.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid callstack table: {0}")]
    SymbolTable(String),

    #[error("no snapshot at index {0}")]
    NoSuchSnapshot(usize),

    #[error("no callstack with id {0}")]
    NoSuchCallstack(u64),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

/// Outcome of reading a capture file. Any non-`Ok` status is fatal to the
/// run: no report is built from a capture that failed to unpack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    Ok,
    FailedUnpackingAllocsFile,
    FailedReadingSymbols,
    Fatal(String),
}

impl ReadStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ReadStatus::Ok)
    }
}

impl fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStatus::Ok => write!(f, "ok"),
            ReadStatus::FailedUnpackingAllocsFile => {
                write!(f, "failed unpacking allocations file")
            }
            ReadStatus::FailedReadingSymbols => write!(f, "failed reading symbols"),
            ReadStatus::Fatal(message) => write!(f, "{}", message),
        }
    }
}

// ============================================================================
// Data model
// ============================================================================

/// A resolved callstack. Frames are stored innermost first; `symbols` and
/// `addresses` are parallel sequences and either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Callstack {
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<u64>,
}

/// One sampled allocation living on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAllocation {
    pub size: u64,
    #[serde(default)]
    pub stack_id: u64,
}

/// An OS-level mapped memory region with aggregate usage and a bounded
/// sample of its allocations. Pages are accounted independently of the
/// per-callstack counters; their totals come from their own allocation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub address: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub protection: String,
    #[serde(default)]
    pub stack_id: u64,
    #[serde(default)]
    pub usage: u64,
    #[serde(default)]
    pub allocations: Vec<PageAllocation>,
}

impl Page {
    /// Total bytes across this page's own allocation records.
    pub fn allocated_total(&self) -> u64 {
        self.allocations.iter().map(|a| a.size).sum()
    }
}

/// Per-callstack counters reported by one snapshot: total bytes and a signed
/// allocation count. No per-allocation size distribution is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub callstack_id: u64,
    pub bytes: u64,
    pub count: i64,
}

/// A point-in-time accounting record emitted by the decoder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub allocated_bytes: u64,
    #[serde(default)]
    pub reserved_bytes: u64,
    #[serde(default)]
    pub committed_bytes: u64,
    #[serde(default)]
    pub records: Vec<AllocationRecord>,
}

// ============================================================================
// Session interface
// ============================================================================

/// Decoder-side view of a capture session.
///
/// Snapshots are addressed by index and must be consumed strictly in index
/// order; the underlying session handle is not safe for concurrent access.
pub trait CaptureSession {
    fn session_name(&self) -> &str;

    fn snapshot_count(&self) -> usize;

    /// Fetch one snapshot's metadata and counter records.
    fn snapshot(&self, index: usize) -> Result<SnapshotData>;

    /// Fetch one snapshot's page list. Fallible independently of
    /// [`snapshot`](CaptureSession::snapshot).
    fn pages(&self, index: usize) -> Result<Vec<Page>>;

    /// Resolve a callstack id into its symbol and address sequences.
    fn callstack(&self, id: u64) -> Result<Callstack>;
}

// ============================================================================
// JSON capture decoder
// ============================================================================

/// Raw capture file structure.
#[derive(Debug, Default, Deserialize)]
struct CaptureDocument {
    #[serde(default)]
    session_name: String,
    #[serde(default)]
    snapshots: Vec<RawSnapshot>,
    /// Callstack table keyed by decimal id.
    #[serde(default)]
    callstacks: HashMap<String, Callstack>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    name: String,
    #[serde(default)]
    allocated_bytes: u64,
    #[serde(default)]
    reserved_bytes: u64,
    #[serde(default)]
    committed_bytes: u64,
    #[serde(default)]
    callstacks: Vec<AllocationRecord>,
    #[serde(default)]
    pages: Vec<Page>,
}

/// Capture session backed by a JSON capture document.
///
/// Lifecycle mirrors the decoder contract: construct, [`read`](Self::read) a
/// file (any non-`Ok` status aborts the run), optionally surface a symbol
/// warning via [`load_symbol_files`](Self::load_symbol_files), then hand the
/// session to [`analysis::analyze`](crate::analysis::analyze). The session
/// releases its resources on drop, on every exit path.
#[derive(Debug, Default)]
pub struct JsonCapture {
    session_name: String,
    snapshots: Vec<RawSnapshot>,
    callstacks: HashMap<u64, Callstack>,
}

impl JsonCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a capture document from a reader.
    pub fn parse<R: Read>(reader: R) -> Result<Self> {
        let doc: CaptureDocument = serde_json::from_reader(reader)?;

        let mut callstacks = HashMap::with_capacity(doc.callstacks.len());
        for (key, stack) in doc.callstacks {
            let id = key
                .parse::<u64>()
                .map_err(|_| CaptureError::SymbolTable(format!("bad callstack id '{}'", key)))?;
            callstacks.insert(id, stack);
        }

        Ok(Self {
            session_name: doc.session_name,
            snapshots: doc.snapshots,
            callstacks,
        })
    }

    /// Read and unpack a capture file.
    ///
    /// An unopenable file is fatal; a JSON decoding failure maps to
    /// [`ReadStatus::FailedUnpackingAllocsFile`] and a malformed callstack
    /// table to [`ReadStatus::FailedReadingSymbols`]. When the document does
    /// not name the session, the input file stem is used.
    pub fn read(&mut self, path: &Path) -> ReadStatus {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                return ReadStatus::Fatal(format!("cannot open {}: {}", path.display(), e));
            }
        };

        match Self::parse(BufReader::new(file)) {
            Ok(mut capture) => {
                if capture.session_name.is_empty() {
                    capture.session_name = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("capture")
                        .to_string();
                }
                *self = capture;
                ReadStatus::Ok
            }
            Err(CaptureError::Json(_)) => ReadStatus::FailedUnpackingAllocsFile,
            Err(CaptureError::SymbolTable(_)) => ReadStatus::FailedReadingSymbols,
            Err(e) => ReadStatus::Fatal(e.to_string()),
        }
    }

    /// Sweep the callstack table for missing symbol data.
    ///
    /// Returns a warning when stacks carry raw addresses without symbol text;
    /// analysis proceeds either way, with address fallbacks in the reports.
    pub fn load_symbol_files(&self) -> Option<String> {
        let unsymbolized = self
            .callstacks
            .values()
            .filter(|c| c.symbols.is_empty() && !c.addresses.is_empty())
            .count();

        if unsymbolized > 0 {
            Some(format!("{} callstack(s) have no symbol data", unsymbolized))
        } else {
            None
        }
    }
}

impl CaptureSession for JsonCapture {
    fn session_name(&self) -> &str {
        &self.session_name
    }

    fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    fn snapshot(&self, index: usize) -> Result<SnapshotData> {
        let raw = self
            .snapshots
            .get(index)
            .ok_or(CaptureError::NoSuchSnapshot(index))?;

        Ok(SnapshotData {
            name: raw.name.clone(),
            allocated_bytes: raw.allocated_bytes,
            reserved_bytes: raw.reserved_bytes,
            committed_bytes: raw.committed_bytes,
            records: raw.callstacks.clone(),
        })
    }

    fn pages(&self, index: usize) -> Result<Vec<Page>> {
        let raw = self
            .snapshots
            .get(index)
            .ok_or(CaptureError::NoSuchSnapshot(index))?;

        Ok(raw.pages.clone())
    }

    fn callstack(&self, id: u64) -> Result<Callstack> {
        self.callstacks
            .get(&id)
            .cloned()
            .ok_or(CaptureError::NoSuchCallstack(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE_CAPTURE: &str = r#"{
        "session_name": "myapp",
        "snapshots": [
            {
                "name": "startup",
                "allocated_bytes": 4096,
                "reserved_bytes": 8192,
                "committed_bytes": 6144,
                "callstacks": [
                    {"callstack_id": 1, "bytes": 1024, "count": 2}
                ],
                "pages": [
                    {
                        "address": 65536,
                        "state": "committed",
                        "kind": "private",
                        "protection": "rw",
                        "stack_id": 1,
                        "usage": 512,
                        "allocations": [
                            {"size": 256, "stack_id": 1},
                            {"size": 128, "stack_id": 1}
                        ]
                    }
                ]
            }
        ],
        "callstacks": {
            "1": {
                "symbols": ["Foo::alloc (foo.cpp(10))", "main (main.cpp(3))"],
                "addresses": [4096, 8192]
            }
        }
    }"#;

    #[test]
    fn parse_sample_capture() {
        let capture = JsonCapture::parse(Cursor::new(SAMPLE_CAPTURE)).unwrap();

        assert_eq!(capture.session_name(), "myapp");
        assert_eq!(capture.snapshot_count(), 1);

        let snapshot = capture.snapshot(0).unwrap();
        assert_eq!(snapshot.name, "startup");
        assert_eq!(snapshot.allocated_bytes, 4096);
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].callstack_id, 1);
        assert_eq!(snapshot.records[0].bytes, 1024);
        assert_eq!(snapshot.records[0].count, 2);
    }

    #[test]
    fn pages_are_fetched_per_snapshot() {
        let capture = JsonCapture::parse(Cursor::new(SAMPLE_CAPTURE)).unwrap();

        let pages = capture.pages(0).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].address, 65536);
        assert_eq!(pages[0].usage, 512);
        assert_eq!(pages[0].allocated_total(), 384);
    }

    #[test]
    fn callstack_lookup() {
        let capture = JsonCapture::parse(Cursor::new(SAMPLE_CAPTURE)).unwrap();

        let stack = capture.callstack(1).unwrap();
        assert_eq!(stack.symbols.len(), 2);
        assert_eq!(stack.addresses, vec![4096, 8192]);

        assert!(matches!(
            capture.callstack(99),
            Err(CaptureError::NoSuchCallstack(99))
        ));
    }

    #[test]
    fn missing_snapshot_index_is_an_error() {
        let capture = JsonCapture::parse(Cursor::new(SAMPLE_CAPTURE)).unwrap();

        assert!(matches!(
            capture.snapshot(5),
            Err(CaptureError::NoSuchSnapshot(5))
        ));
        assert!(matches!(
            capture.pages(5),
            Err(CaptureError::NoSuchSnapshot(5))
        ));
    }

    #[test]
    fn missing_fields_default() {
        let capture = JsonCapture::parse(Cursor::new(r#"{"snapshots": [{}]}"#)).unwrap();

        assert_eq!(capture.session_name(), "");
        let snapshot = capture.snapshot(0).unwrap();
        assert_eq!(snapshot.allocated_bytes, 0);
        assert!(snapshot.records.is_empty());
        assert!(capture.pages(0).unwrap().is_empty());
    }

    #[test]
    fn bad_callstack_key_is_a_symbol_table_error() {
        let input = r#"{"callstacks": {"not-a-number": {"symbols": [], "addresses": []}}}"#;
        let result = JsonCapture::parse(Cursor::new(input));

        assert!(matches!(result, Err(CaptureError::SymbolTable(_))));
    }

    #[test]
    fn load_symbol_files_warns_on_bare_addresses() {
        let input = r#"{
            "callstacks": {
                "1": {"symbols": [], "addresses": [4096]},
                "2": {"symbols": ["main (main.cpp(1))"], "addresses": [8192]}
            }
        }"#;
        let capture = JsonCapture::parse(Cursor::new(input)).unwrap();

        let warning = capture.load_symbol_files().unwrap();
        assert!(warning.contains("1 callstack"));
    }

    #[test]
    fn load_symbol_files_silent_when_symbolized() {
        let capture = JsonCapture::parse(Cursor::new(SAMPLE_CAPTURE)).unwrap();

        assert!(capture.load_symbol_files().is_none());
    }

    #[test]
    fn read_reports_fatal_for_missing_file() {
        let mut capture = JsonCapture::new();
        let status = capture.read(Path::new("/nonexistent/capture.mcap"));

        assert!(matches!(status, ReadStatus::Fatal(_)));
        assert!(!status.is_ok());
    }
}
