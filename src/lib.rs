//! Offline memory-capture analysis engine.
//!
//! This crate turns the raw accounting data of a capture session — per-callstack
//! byte/allocation counters and per-page usage records — into five derived
//! reports: a call tree, a per-function summary, a leak-candidate list, a
//! page-usage view, and a per-type summary.
//!
//! # Pipeline
//!
//! - [`capture`] - capture-session interface and JSON-backed decoder
//! - [`ingest`] - merge all snapshots into one accounting map and page list
//! - [`resolve`] - lazy, memoized callstack resolution
//! - [`symbols`] - heuristic symbol decomposition
//! - [`builders`] - the five report builders
//! - [`analysis`] - end-to-end orchestration
//!
//! # Example
//!
//! ```no_run
//! use memcap::analysis;
//! use memcap::capture::JsonCapture;
//! use std::path::Path;
//!
//! let mut session = JsonCapture::new();
//! let status = session.read(Path::new("app.mcap"));
//! assert!(status.is_ok());
//!
//! let report = analysis::analyze(&session).unwrap();
//! println!("{} bytes tracked across {} snapshots",
//!     report.total_size, report.total_snapshots);
//! ```

pub mod analysis;
pub mod builders;
pub mod capture;
pub mod ingest;
pub mod report;
pub mod resolve;
pub mod symbols;
