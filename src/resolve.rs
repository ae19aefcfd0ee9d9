//! Lazy, memoized callstack resolution.

use crate::capture::{Callstack, CaptureSession};
use std::collections::HashMap;

/// Cache of callstack id -> resolved stack.
///
/// Resolution is insert-if-absent: the first `resolve` for an id queries the
/// session, every later one returns the cached value. A failed resolution is
/// logged once, remembered as a miss, and never retried.
#[derive(Debug, Default)]
pub struct CallstackResolver {
    cache: HashMap<u64, Option<Callstack>>,
}

impl CallstackResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an id, querying the session at most once per id.
    pub fn resolve<S: CaptureSession>(&mut self, session: &S, id: u64) -> Option<&Callstack> {
        self.cache
            .entry(id)
            .or_insert_with(|| match session.callstack(id) {
                Ok(stack) => Some(stack),
                Err(e) => {
                    eprintln!("warning: failed to resolve callstack {}: {}", id, e);
                    None
                }
            })
            .as_ref()
    }

    /// Cached-only lookup; never queries the session.
    pub fn get(&self, id: u64) -> Option<&Callstack> {
        self.cache.get(&id).and_then(|cached| cached.as_ref())
    }
}
