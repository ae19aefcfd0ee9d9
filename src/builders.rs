//! The five report builders.
//!
//! Each builder is a pure transform over the merged accounting map, the
//! resolved callstacks, and the global page list. All ranking is descending
//! on the selection key with ties broken by the accounting map's insertion
//! order (stable sort over a stable iteration), so repeated runs over the
//! same merged data produce identical output.

use crate::capture::{Callstack, CaptureSession, Page};
use crate::ingest::{AccountingMap, Counters};
use crate::report::{CallTreeNode, FunctionEntry, LeakEntry, PageViewEntry, TypeEntry};
use crate::resolve::CallstackResolver;
use crate::symbols;
use std::collections::HashMap;

const CALL_TREE_LIMIT: usize = 10;
const MAX_TREE_CHILDREN: usize = 4;
const FUNCTION_LIMIT: usize = 20;
const LEAK_LIMIT: usize = 10;
const PAGE_LIMIT: usize = 20;
const TYPE_LIMIT: usize = 15;

const SUSPECT_COUNT_THRESHOLD: i64 = 100;
const SUSPECT_BYTES_THRESHOLD: u64 = 1_048_576;

/// Display name for a stack: innermost symbol, else innermost address in
/// hex, else a fixed placeholder.
fn stack_label(stack: Option<&Callstack>) -> String {
    match stack {
        Some(s) if !s.symbols.is_empty() => s.symbols[0].clone(),
        Some(s) if !s.addresses.is_empty() => format!("0x{:x}", s.addresses[0]),
        _ => "Unknown Function".to_string(),
    }
}

/// Source location of a stack's innermost symbol.
fn stack_location(stack: Option<&Callstack>) -> (String, u32) {
    match stack {
        Some(s) if !s.symbols.is_empty() => symbols::file_and_line(&s.symbols[0]),
        _ => (String::new(), 0),
    }
}

/// Top `limit` accounting entries by `key`, descending, insertion order on
/// ties.
fn top_by<K, F>(accounting: &AccountingMap, limit: usize, key: F) -> Vec<(u64, Counters)>
where
    K: Ord,
    F: Fn(&Counters) -> K,
{
    let mut entries: Vec<(u64, Counters)> = accounting.iter().collect();
    entries.sort_by(|a, b| key(&b.1).cmp(&key(&a.1)));
    entries.truncate(limit);
    entries
}

/// bytes / count, zero when the record holds no allocations. The capture
/// carries no per-allocation sizes, so min and max collapse onto this value.
fn average_size(bytes: u64, count: i64) -> u64 {
    if count > 0 { bytes / count as u64 } else { 0 }
}

fn percentage_of(bytes: u64, total_bytes: u64) -> f64 {
    if total_bytes > 0 {
        bytes as f64 / total_bytes as f64 * 100.0
    } else {
        0.0
    }
}

fn join_addresses(addresses: &[u64]) -> String {
    addresses
        .iter()
        .map(|a| format!("0x{:x}", a))
        .collect::<Vec<_>>()
        .join(" <- ")
}

// ============================================================================
// Call trees
// ============================================================================

/// Build a tree for each of the 10 highest-count callstacks.
pub fn build_call_trees<S: CaptureSession>(
    accounting: &AccountingMap,
    resolver: &mut CallstackResolver,
    session: &S,
) -> Vec<CallTreeNode> {
    let top = top_by(accounting, CALL_TREE_LIMIT, |c| c.count);
    let mut trees = Vec::with_capacity(top.len());

    for (id, counters) in top {
        let stack = resolver.resolve(session, id);
        trees.push(call_tree_node(stack, counters));
    }

    trees
}

fn call_tree_node(stack: Option<&Callstack>, counters: Counters) -> CallTreeNode {
    let function_name = stack_label(stack);
    let (file_name, line_number) = stack_location(stack);

    let mut root = CallTreeNode {
        function_name,
        file_name,
        line_number,
        allocation_count: counters.count,
        total_size: counters.bytes,
        self_size: counters.bytes,
        inclusive_size: counters.bytes,
        children: Vec::new(),
    };

    if let Some(stack) = stack {
        let frame_count = stack.symbols.len();
        if frame_count > 1 {
            // Synthetic children: the counters cover the whole stack, so the
            // cost is spread evenly — bytes across the non-root frames,
            // counts across all frames with a floor of one per child.
            let child_size = counters.bytes / (frame_count as u64 - 1).max(1);
            let child_count = (counters.count / frame_count as i64).max(1);

            for symbol in stack.symbols.iter().skip(1).take(MAX_TREE_CHILDREN) {
                let (file, line) = symbols::file_and_line(symbol);
                root.children.push(CallTreeNode {
                    function_name: symbol.clone(),
                    file_name: file,
                    line_number: line,
                    allocation_count: child_count,
                    total_size: child_size,
                    self_size: child_size,
                    inclusive_size: child_size,
                    children: Vec::new(),
                });
            }
        }
    }

    root
}

// ============================================================================
// Function summaries
// ============================================================================

/// Summarize the 20 callstacks holding the most bytes.
pub fn build_function_summaries<S: CaptureSession>(
    accounting: &AccountingMap,
    resolver: &mut CallstackResolver,
    session: &S,
) -> Vec<FunctionEntry> {
    let total_bytes = accounting.total_bytes();
    let top = top_by(accounting, FUNCTION_LIMIT, |c| c.bytes);
    let mut entries = Vec::with_capacity(top.len());

    for (id, counters) in top {
        let stack = resolver.resolve(session, id);
        let function_name = stack_label(stack);
        let (file_name, line_number) = stack_location(stack);
        let average = average_size(counters.bytes, counters.count);

        entries.push(FunctionEntry {
            function_name,
            file_name,
            line_number,
            allocation_count: counters.count,
            total_size: counters.bytes,
            average_size: average,
            min_size: average,
            max_size: average,
            percentage: percentage_of(counters.bytes, total_bytes),
        });
    }

    entries
}

// ============================================================================
// Leak candidates
// ============================================================================

/// Flag the 10 highest-count callstacks as leak candidates. Selection is by
/// raw count; the log-product score only orders the display.
pub fn build_leaks<S: CaptureSession>(
    accounting: &AccountingMap,
    resolver: &mut CallstackResolver,
    session: &S,
) -> Vec<LeakEntry> {
    let top = top_by(accounting, LEAK_LIMIT, |c| c.count);
    let mut entries = Vec::with_capacity(top.len());

    for (id, counters) in top {
        let stack = resolver.resolve(session, id);
        let function_name = stack_label(stack);
        let (file_name, line_number) = stack_location(stack);
        let call_stack = stack
            .map(|s| join_addresses(&s.addresses))
            .unwrap_or_default();

        entries.push(LeakEntry {
            function_name,
            file_name,
            line_number,
            leak_size: counters.bytes,
            leak_count: counters.count,
            leak_score: leak_score(counters),
            call_stack,
            is_suspect: counters.count > SUSPECT_COUNT_THRESHOLD
                || counters.bytes > SUSPECT_BYTES_THRESHOLD,
        });
    }

    entries
}

/// log10 product of count and bytes, each floored at one.
fn leak_score(counters: Counters) -> f64 {
    let count = counters.count.max(1) as f64;
    let bytes = counters.bytes.max(1) as f64;
    count.log10() * bytes.log10()
}

// ============================================================================
// Page views
// ============================================================================

/// View the 20 most-used pages. Page totals come from each page's own
/// allocation list, independent of the accounting map.
pub fn build_page_views<S: CaptureSession>(
    pages: &[Page],
    resolver: &mut CallstackResolver,
    session: &S,
) -> Vec<PageViewEntry> {
    let mut ranked: Vec<&Page> = pages.iter().collect();
    ranked.sort_by(|a, b| b.usage.cmp(&a.usage));
    ranked.truncate(PAGE_LIMIT);

    let mut entries = Vec::with_capacity(ranked.len());
    for page in ranked {
        let address = format!("0x{:x}", page.address);

        // Name the page after its first sampled allocation's stack; any
        // resolution miss falls back to the page address.
        let (function_name, call_stack) = match page.allocations.first() {
            Some(alloc) => match resolver.resolve(session, alloc.stack_id) {
                Some(stack) if !stack.symbols.is_empty() => {
                    (stack.symbols[0].clone(), join_addresses(&stack.addresses))
                }
                _ => (address.clone(), String::new()),
            },
            None => (address.clone(), String::new()),
        };

        entries.push(PageViewEntry {
            address,
            state: page.state.clone(),
            kind: page.kind.clone(),
            protection: page.protection.clone(),
            stack_id: page.stack_id,
            usage: page.usage,
            allocation_count: page.allocations.len() as i64,
            total_size: page.allocated_total(),
            function_name,
            call_stack,
        });
    }

    entries
}

// ============================================================================
// Type summaries
// ============================================================================

struct TypeGroup {
    bytes: u64,
    count: i64,
    top_symbol: String,
    top_count: i64,
}

/// Group resolvable callstacks by the type-name heuristic on their innermost
/// symbol and summarize the 15 groups holding the most bytes.
pub fn build_type_summaries<S: CaptureSession>(
    accounting: &AccountingMap,
    resolver: &mut CallstackResolver,
    session: &S,
) -> Vec<TypeEntry> {
    let total_bytes = accounting.total_bytes();

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, TypeGroup> = HashMap::new();

    for (id, counters) in accounting.iter() {
        let innermost = match resolver.resolve(session, id) {
            Some(stack) => match stack.symbols.first() {
                Some(symbol) => symbol.clone(),
                None => continue,
            },
            None => continue,
        };

        let type_name = symbols::type_name(&innermost);
        if type_name.is_empty() {
            continue;
        }

        match groups.get_mut(&type_name) {
            Some(group) => {
                group.bytes += counters.bytes;
                group.count += counters.count;
                if counters.count > group.top_count {
                    group.top_count = counters.count;
                    group.top_symbol = innermost;
                }
            }
            None => {
                order.push(type_name.clone());
                groups.insert(
                    type_name,
                    TypeGroup {
                        bytes: counters.bytes,
                        count: counters.count,
                        top_symbol: innermost,
                        top_count: counters.count,
                    },
                );
            }
        }
    }

    let mut ranked: Vec<(String, TypeGroup)> = order
        .into_iter()
        .filter_map(|name| groups.remove(&name).map(|group| (name, group)))
        .collect();
    ranked.sort_by(|a, b| b.1.bytes.cmp(&a.1.bytes));
    ranked.truncate(TYPE_LIMIT);

    ranked
        .into_iter()
        .map(|(type_name, group)| {
            let average = average_size(group.bytes, group.count);
            let (most_common_file, most_common_line) = symbols::file_and_line(&group.top_symbol);

            TypeEntry {
                type_name,
                allocation_count: group.count,
                total_size: group.bytes,
                average_size: average,
                min_size: average,
                max_size: average,
                percentage: percentage_of(group.bytes, total_bytes),
                most_common_function: group.top_symbol,
                most_common_file,
                most_common_line,
            }
        })
        .collect()
}
