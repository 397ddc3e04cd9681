use std::io::BufRead;

use anyhow::{Context, Result};
use git2_alloc_trace::{AllocEvent, EventConnection, HeapTracker, TrackError};

/// Feeds events into a [`HeapTracker`], downgrading unknown frees to
/// warnings.
#[derive(Debug, Default)]
pub struct Scan {
    pub tracker: HeapTracker,
    pub events: u64,
}

impl Scan {
    pub fn new() -> Scan {
        Scan::default()
    }

    pub fn apply(&mut self, event: AllocEvent) {
        self.events += 1;
        if let Err(TrackError::UnknownAddress(addr)) = self.tracker.apply(event) {
            log::warn!("dealloc of unknown address {addr:#x}");
        }
    }

    /// Reads file-sink lines until EOF. Blank lines are skipped; anything
    /// else that does not parse is an error.
    pub fn feed_lines<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read line {}", idx + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            let event = AllocEvent::parse_line(&line)
                .with_context(|| format!("line {}: {line:?}", idx + 1))?;
            self.apply(event);
        }
        Ok(())
    }

    pub fn feed_connection(&mut self, conn: &mut EventConnection) -> Result<()> {
        while let Some(event) = conn.recv().context("receive allocation event")? {
            self.apply(event);
        }
        Ok(())
    }
}
