//! Snapshot ingestion and the merged accounting map.

use crate::capture::{CaptureSession, Page};
use std::collections::HashMap;

/// Per-callstack counters after merging: total bytes and a signed
/// allocation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub bytes: u64,
    pub count: i64,
}

/// Insertion-ordered map of callstack id -> merged counters.
///
/// When the same id appears in multiple snapshots, the later snapshot's
/// record replaces the earlier value in place — last write wins, counters are
/// not accumulated — and the id keeps its original position. Ranking ties
/// therefore break on first appearance, and iteration order is identical
/// across runs over the same capture.
#[derive(Debug, Default)]
pub struct AccountingMap {
    ids: Vec<u64>,
    counters: Vec<Counters>,
    index: HashMap<u64, usize>,
}

impl AccountingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the counters for an id, replacing any earlier value.
    pub fn insert(&mut self, id: u64, counters: Counters) {
        match self.index.get(&id) {
            Some(&slot) => self.counters[slot] = counters,
            None => {
                self.index.insert(id, self.ids.len());
                self.ids.push(id);
                self.counters.push(counters);
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<Counters> {
        self.index.get(&id).map(|&slot| self.counters[slot])
    }

    /// Iterate in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Counters)> + '_ {
        self.ids.iter().copied().zip(self.counters.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sum of bytes over the full map.
    pub fn total_bytes(&self) -> u64 {
        self.counters.iter().map(|c| c.bytes).sum()
    }

    /// Sum of allocation counts over the full map.
    pub fn total_count(&self) -> i64 {
        self.counters.iter().map(|c| c.count).sum()
    }
}

/// Merge every snapshot's counter records into one accounting map and
/// concatenate the page lists, strictly in index order.
///
/// Failures are isolated per unit: a snapshot that cannot be fetched is
/// logged and skipped, as is a page list that cannot be fetched, and
/// processing continues with the remaining indices.
pub fn ingest<S: CaptureSession>(session: &S) -> (AccountingMap, Vec<Page>) {
    let mut accounting = AccountingMap::new();
    let mut pages = Vec::new();

    for index in 0..session.snapshot_count() {
        let snapshot = match session.snapshot(index) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                eprintln!("warning: skipping snapshot {}: {}", index, e);
                continue;
            }
        };

        for record in &snapshot.records {
            accounting.insert(
                record.callstack_id,
                Counters {
                    bytes: record.bytes,
                    count: record.count,
                },
            );
        }

        match session.pages(index) {
            Ok(mut snapshot_pages) => pages.append(&mut snapshot_pages),
            Err(e) => eprintln!("warning: skipping pages for snapshot {}: {}", index, e),
        }
    }

    (accounting, pages)
}
