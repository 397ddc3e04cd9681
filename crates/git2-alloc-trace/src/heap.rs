//! Live-heap reconstruction from an event stream.

use std::collections::HashMap;

use serde::Serialize;

use crate::event::{AllocEvent, EventKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub allocations: u64,
    pub deallocations: u64,
    pub resizes: u64,
    pub live_bytes: u64,
    pub peak_bytes: u64,
    pub unmatched_deallocations: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("dealloc of unknown address {0:#x}")]
    UnknownAddress(usize),
}

/// Live allocations sharing one call-site and backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakEntry {
    pub allocation_count: u64,
    pub allocation_size: u64,
    pub site: String,
    pub backtrace: Vec<String>,
}

impl LeakEntry {
    pub fn average_size(&self) -> u64 {
        if self.allocation_count == 0 {
            0
        } else {
            self.allocation_size / self.allocation_count
        }
    }
}

#[derive(Debug, Default)]
pub struct HeapTracker {
    live: HashMap<usize, AllocEvent>,
    stats: HeapStats,
}

impl HeapTracker {
    pub fn new() -> HeapTracker {
        HeapTracker::default()
    }

    /// Applies one event. An unknown `Dealloc` is counted and reported but
    /// leaves the tracker consistent.
    pub fn apply(&mut self, event: AllocEvent) -> Result<(), TrackError> {
        match event.kind {
            EventKind::Alloc => {
                self.stats.allocations += 1;
                self.stats.live_bytes += event.size as u64;
                if let Some(prev) = self.live.insert(event.address, event) {
                    self.stats.live_bytes -= prev.size as u64;
                }
            }
            EventKind::Resize => {
                self.stats.resizes += 1;
                match self.live.get_mut(&event.address) {
                    Some(live) => {
                        self.stats.live_bytes -= live.size as u64;
                        self.stats.live_bytes += event.size as u64;
                        live.size = event.size;
                    }
                    None => {
                        self.stats.live_bytes += event.size as u64;
                        self.live.insert(event.address, event);
                    }
                }
            }
            EventKind::Dealloc => match self.live.remove(&event.address) {
                Some(prev) => {
                    self.stats.deallocations += 1;
                    self.stats.live_bytes -= prev.size as u64;
                }
                None => {
                    self.stats.unmatched_deallocations += 1;
                    return Err(TrackError::UnknownAddress(event.address));
                }
            },
        }
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.live_bytes);
        Ok(())
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_size(&self, address: usize) -> Option<usize> {
        self.live.get(&address).map(|e| e.size)
    }

    /// Groups the live heap by call-site and backtrace, largest total first.
    pub fn leak_summary(&self) -> Vec<LeakEntry> {
        let mut groups: HashMap<(String, &[String]), LeakEntry> = HashMap::new();
        for event in self.live.values() {
            let site = event
                .site
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_default();
            let entry = groups
                .entry((site.clone(), event.backtrace.as_slice()))
                .or_insert_with(|| LeakEntry {
                    allocation_count: 0,
                    allocation_size: 0,
                    site,
                    backtrace: event.backtrace.clone(),
                });
            entry.allocation_count += 1;
            entry.allocation_size += event.size as u64;
        }
        let mut out: Vec<LeakEntry> = groups.into_values().collect();
        out.sort_by(|a, b| {
            b.allocation_size
                .cmp(&a.allocation_size)
                .then_with(|| a.site.cmp(&b.site))
        });
        out
    }
}
