use std::cell::Cell;

use backupcheck::scanner::{DomReader, RawRow, ScanError, ScrollOffsets};

pub const ROW_HEIGHT_PX: u32 = 40;

/// In-memory virtualized list: only `window` rows starting at the current
/// scroll offset are "rendered", and the offset stops at the last full window.
pub struct FakeDrive {
    rows: Vec<RawRow>,
    window: usize,
    offset: i64,
    has_container: bool,
    dates_pending_reads: usize,
    reads: Cell<usize>,
}

impl FakeDrive {
    pub fn new(rows: Vec<RawRow>, window: usize) -> Self {
        Self {
            rows,
            window,
            offset: 0,
            has_container: true,
            dates_pending_reads: 0,
            reads: Cell::new(0),
        }
    }

    pub fn without_container(mut self) -> Self {
        self.has_container = false;
        self
    }

    /// Render rows without their date cell for the first `reads` reads.
    pub fn with_dates_pending(mut self, reads: usize) -> Self {
        self.dates_pending_reads = reads;
        self
    }

    /// Number of times the visible rows were read.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    fn max_offset(&self) -> i64 {
        let hidden = self.rows.len().saturating_sub(self.window);
        hidden as i64 * ROW_HEIGHT_PX as i64
    }
}

impl DomReader for FakeDrive {
    fn has_scroll_container(&self) -> Result<bool, ScanError> {
        Ok(self.has_container)
    }

    fn visible_rows(&self) -> Result<Vec<RawRow>, ScanError> {
        self.reads.set(self.reads.get() + 1);
        let start = (self.offset / ROW_HEIGHT_PX as i64) as usize;
        let end = (start + self.window).min(self.rows.len());
        let mut rows = self.rows.get(start..end).map(<[RawRow]>::to_vec).unwrap_or_default();
        if self.reads.get() <= self.dates_pending_reads {
            for row in &mut rows {
                row.date = None;
            }
        }
        Ok(rows)
    }

    fn scroll_by(&mut self, px: u32) -> Result<ScrollOffsets, ScanError> {
        let before = self.offset;
        self.offset = (self.offset + px as i64).min(self.max_offset());
        Ok(ScrollOffsets {
            before,
            after: self.offset,
        })
    }
}

/// A backup row for `domain` shown with `date`, in the Drive display format.
pub fn backup_row(domain: &str, date: &str) -> RawRow {
    RawRow::new(&format!("{}_wpvivid-5f1e2d_2025-03-01-10-00_backup_all.zip", domain), date)
}
