use std::fmt::Write as _;

use git2_alloc_trace::{HeapStats, LeakEntry};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Summary {
    pub events: u64,
    pub stats: HeapStats,
    pub leaks: Vec<LeakEntry>,
}

/// Renders the leak table, or `No leaks!` when nothing is live.
pub fn render_table(leaks: &[LeakEntry]) -> String {
    if leaks.is_empty() {
        return "No leaks!\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>20} | {:>20} | {:>11} | Call-site",
        "Total size", "Average size", "Allocations"
    );
    let _ = writeln!(out, "{:=<20}=+={:=<20}=+={:=<11}=+={:=<64}", "", "", "", "");
    for entry in leaks {
        let _ = writeln!(
            out,
            "{:>20} | {:>20} | {:>11} | {}",
            entry.allocation_size,
            entry.average_size(),
            entry.allocation_count,
            entry.site
        );
        for frame in &entry.backtrace {
            let _ = writeln!(out, "{:20} | {:20} | {:11} | {frame}", "", "", "");
        }
        let _ = writeln!(out, "{:-<20}-+-{:-<20}-+-{:-<11}-+-{:-<64}", "", "", "", "");
    }
    out
}
