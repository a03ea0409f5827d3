//! Scrollback buffer implementation
//!
//! The scrollback buffer stores lines that have scrolled off the top of the
//! visible screen. It's implemented as a ring buffer with a fixed maximum
//! size; once full, the oldest line is evicted by every append.

use serde::{Deserialize, Serialize};

use super::cell::Cell;
use super::line::Line;

/// Errors from scrollback access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrollbackError {
    #[error("scrollback index {index} out of range (holding {len} lines)")]
    OutOfRange { index: usize, len: usize },
}

/// An archived row. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollbackLine {
    seq: u64,
    cells: Vec<Cell>,
    wrapped: bool,
}

impl ScrollbackLine {
    /// Monotonic sequence number, stable across evictions
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn wrapped(&self) -> bool {
        self.wrapped
    }

    /// Text content with trailing blanks trimmed
    pub fn text(&self) -> String {
        let mut s = String::with_capacity(self.cells.len());
        for cell in self.cells.iter().filter(|c| !c.is_continuation()) {
            if cell.is_empty() {
                s.push(' ');
            } else {
                s.push_str(cell.content());
            }
        }
        s.truncate(s.trim_end().len());
        s
    }
}

/// Ring buffer for scrollback lines
#[derive(Debug, Clone)]
pub struct Scrollback {
    lines: Vec<ScrollbackLine>,
    /// Index of the oldest line
    head: usize,
    len: usize,
    capacity: usize,
    next_seq: u64,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        Self {
            // Don't pre-allocate huge histories up front
            lines: Vec::with_capacity(capacity.min(1024)),
            head: 0,
            len: 0,
            capacity,
            next_seq: 0,
        }
    }

    pub fn line_count(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Archive a row, evicting the oldest line when full.
    ///
    /// Returns the sequence number assigned to the line. With zero capacity
    /// the line is dropped but still consumes a sequence number.
    pub fn append(&mut self, line: Line) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.capacity == 0 {
            return seq;
        }

        let entry = ScrollbackLine {
            seq,
            cells: line.cells,
            wrapped: line.wrapped,
        };

        if self.lines.len() < self.capacity {
            self.lines.push(entry);
            self.len += 1;
        } else {
            let slot = (self.head + self.len) % self.capacity;
            self.lines[slot] = entry;
            if self.len < self.capacity {
                self.len += 1;
            } else {
                self.head = (self.head + 1) % self.capacity;
            }
        }
        seq
    }

    /// Line by index, 0 being the oldest
    pub fn get(&self, index: usize) -> Result<&ScrollbackLine, ScrollbackError> {
        if index >= self.len {
            return Err(ScrollbackError::OutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(&self.lines[(self.head + index) % self.lines.len()])
    }

    /// Sequence number of the oldest retained line
    pub fn first_seq(&self) -> Option<u64> {
        self.get(0).ok().map(ScrollbackLine::seq)
    }

    /// Current index of the line with sequence number `seq`, if still retained
    pub fn index_of_seq(&self, seq: u64) -> Option<usize> {
        let first = self.first_seq()?;
        let index = usize::try_from(seq.checked_sub(first)?).ok()?;
        (index < self.len).then_some(index)
    }

    /// Remove every line. Sequence numbers keep counting.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.head = 0;
        self.len = 0;
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ScrollbackLine> + ExactSizeIterator + '_ {
        (0..self.len).map(move |i| &self.lines[(self.head + i) % self.lines.len()])
    }

    /// Change the capacity, keeping the most recent lines
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity == self.capacity {
            return;
        }
        let keep = self.len.min(capacity);
        let mut lines: Vec<ScrollbackLine> = self.iter().skip(self.len - keep).cloned().collect();
        lines.reserve(capacity.min(1024).saturating_sub(lines.len()));
        self.lines = lines;
        self.head = 0;
        self.len = keep;
        self.capacity = capacity;
    }
}
