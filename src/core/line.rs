//! A single row of cells

use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellAttributes};

/// One row of the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub cells: Vec<Cell>,
    /// Set when the row was filled by autowrap and continues on the next row
    pub wrapped: bool,
}

impl Line {
    pub fn new(cols: usize) -> Self {
        Self::blank(cols, CellAttributes::default())
    }

    /// A row of blank cells carrying `attrs`
    pub fn blank(cols: usize, attrs: CellAttributes) -> Self {
        Self {
            cells: vec![Cell::blank(attrs); cols],
            wrapped: false,
        }
    }

    pub fn from_cells(cells: Vec<Cell>, wrapped: bool) -> Self {
        Self { cells, wrapped }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    pub fn cell(&self, col: usize) -> Option<&Cell> {
        self.cells.get(col)
    }

    pub fn cell_mut(&mut self, col: usize) -> Option<&mut Cell> {
        self.cells.get_mut(col)
    }

    /// Truncate or pad to `cols`. A wide character cut in half at the new
    /// right edge is blanked.
    pub fn resize(&mut self, cols: usize) {
        self.cells.resize(cols, Cell::default());
        if let Some(last) = self.cells.last_mut() {
            if last.is_wide() {
                last.erase(last.attrs.blank());
            }
        }
    }

    /// Blank both halves of a wide character touching `col` so that a write
    /// or erase never leaves an orphaned half behind.
    pub fn split_wide_at(&mut self, col: usize) {
        let Some(cell) = self.cells.get(col) else {
            return;
        };
        if cell.is_continuation() && col > 0 {
            let head = &mut self.cells[col - 1];
            head.erase(head.attrs.blank());
            let tail = &mut self.cells[col];
            tail.erase(tail.attrs.blank());
        } else if cell.is_wide() {
            if let Some(tail) = self.cells.get_mut(col + 1) {
                tail.erase(tail.attrs.blank());
            }
        }
    }

    /// Erase cells in `start..end` (clamped to the row)
    pub fn erase_range(&mut self, start: usize, end: usize, attrs: CellAttributes) {
        let end = end.min(self.cells.len());
        if start >= end {
            return;
        }
        self.split_wide_at(start);
        self.split_wide_at(end - 1);
        for cell in &mut self.cells[start..end] {
            cell.erase(attrs);
        }
    }

    /// Erase every cell and drop the wrap flag
    pub fn clear(&mut self, attrs: CellAttributes) {
        for cell in &mut self.cells {
            cell.erase(attrs);
        }
        self.wrapped = false;
    }

    /// Insert `n` blank cells at `col`, shifting the rest right (ICH)
    pub fn insert_cells(&mut self, col: usize, n: usize, attrs: CellAttributes) {
        let cols = self.cells.len();
        if col >= cols {
            return;
        }
        let n = n.min(cols - col);
        self.split_wide_at(col);
        self.cells.truncate(cols - n);
        for _ in 0..n {
            self.cells.insert(col, Cell::blank(attrs));
        }
        // The shift may have pushed a wide head onto the last column
        self.resize(cols);
    }

    /// Delete `n` cells at `col`, shifting the rest left (DCH)
    pub fn delete_cells(&mut self, col: usize, n: usize, attrs: CellAttributes) {
        let cols = self.cells.len();
        if col >= cols {
            return;
        }
        let n = n.min(cols - col);
        self.split_wide_at(col);
        self.split_wide_at(col + n - 1);
        self.cells.drain(col..col + n);
        self.cells.resize(cols, Cell::blank(attrs));
    }

    /// Text content with continuation cells skipped and trailing blanks trimmed
    pub fn text(&self) -> String {
        let mut s = String::with_capacity(self.cells.len());
        for cell in &self.cells {
            if cell.is_continuation() {
                continue;
            }
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
