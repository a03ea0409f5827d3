//! The visible grid of cells
//!
//! A `Grid` is a fixed `cols x rows` matrix of cells plus the cursor and the
//! scroll region. Every operation leaves the cursor inside the grid, and a
//! wide character always occupies two cells on the same row.

use serde::{Deserialize, Serialize};

use super::cell::{char_width, CellAttributes};
use super::cursor::Cursor;
use super::line::Line;
use super::scrollback::Scrollback;

/// Which part of the grid an erase applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EraseScope {
    /// The cursor's row (EL)
    Line,
    /// The whole visible grid (ED)
    Display,
}

/// Direction of an erase relative to the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EraseMode {
    /// From the cursor to the end, inclusive
    ToEnd,
    /// From the start to the cursor, inclusive
    ToStart,
    All,
}

#[derive(Debug, Clone)]
pub struct Grid {
    lines: Vec<Line>,
    cols: usize,
    rows: usize,
    pub cursor: Cursor,
    /// Scroll region, 0-indexed and inclusive
    scroll_top: usize,
    scroll_bottom: usize,
    /// DECAWM
    pub autowrap: bool,
    /// DECOM: cursor addressing is relative to the scroll region
    pub origin_mode: bool,
    /// IRM: printing shifts the rest of the row right
    pub insert_mode: bool,
}

impl Grid {
    /// Create a blank grid. Dimensions are at least 1x1.
    pub fn new(cols: usize, rows: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            lines: (0..rows).map(|_| Line::new(cols)).collect(),
            cols,
            rows,
            cursor: Cursor::new(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            autowrap: true,
            origin_mode: false,
            insert_mode: false,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, row: usize) -> Option<&Line> {
        self.lines.get(row)
    }

    pub fn line_mut(&mut self, row: usize) -> Option<&mut Line> {
        self.lines.get_mut(row)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&super::cell::Cell> {
        self.lines.get(row).and_then(|line| line.cell(col))
    }

    /// Scroll region as (top, bottom), inclusive
    pub fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bottom)
    }

    /// Print a character at the cursor and advance it.
    ///
    /// With autowrap on, a character printed while a wrap is pending lands at
    /// the start of the next row, scrolling if needed. Lines pushed off the top
    /// of a full-height region go to `history` when one is supplied.
    pub fn write_cell(&mut self, c: char, attrs: CellAttributes, mut history: Option<&mut Scrollback>) {
        let width = char_width(c);
        if width == 0 {
            self.combine_with_previous(c);
            return;
        }

        if self.cursor.pending_wrap {
            self.wrap_line(history.as_deref_mut());
        }

        if width == 2 && self.cursor.col + 1 >= self.cols {
            if !self.autowrap || self.cols < 2 {
                // Nowhere to put both halves
                return;
            }
            let (row, col) = (self.cursor.row, self.cursor.col);
            self.lines[row].erase_range(col, col + 1, attrs.blank());
            self.wrap_line(history.as_deref_mut());
        }

        let (row, col) = (self.cursor.row, self.cursor.col);
        let hyperlink_id = self.cursor.hyperlink_id;
        let line = &mut self.lines[row];
        if self.insert_mode {
            line.insert_cells(col, width, attrs.blank());
        }
        line.split_wide_at(col);
        if width == 2 {
            line.split_wide_at(col + 1);
        }

        let cell = &mut line.cells[col];
        cell.set_char(c);
        cell.attrs = attrs;
        cell.hyperlink_id = hyperlink_id;
        if width == 2 {
            line.cells[col + 1].set_continuation(attrs, hyperlink_id);
        }

        if col + width >= self.cols {
            self.cursor.col = self.cols - 1;
            self.cursor.pending_wrap = self.autowrap;
        } else {
            self.cursor.col = col + width;
        }
    }

    fn combine_with_previous(&mut self, c: char) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        // With a pending wrap the cursor still sits on the cell just written
        let mut target = if self.cursor.pending_wrap {
            Some(col)
        } else {
            col.checked_sub(1)
        };
        let line = &mut self.lines[row];
        if let Some(t) = target {
            if t > 0 && line.cells[t].is_continuation() {
                target = Some(t - 1);
            }
        }
        if let Some(t) = target {
            line.cells[t].push_combining(c);
        }
    }

    fn wrap_line(&mut self, history: Option<&mut Scrollback>) {
        self.lines[self.cursor.row].wrapped = true;
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
        self.linefeed(history);
    }

    /// LF / IND: move down one row, scrolling at the bottom margin
    pub fn linefeed(&mut self, history: Option<&mut Scrollback>) {
        self.cursor.pending_wrap = false;
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up(1, history);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
    }

    /// RI: move up one row, scrolling down at the top margin
    pub fn reverse_index(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    pub fn backspace(&mut self) {
        self.cursor.col = self.cursor.col.saturating_sub(1);
        self.cursor.pending_wrap = false;
    }

    /// Move the cursor to (row, col), clamped to the grid.
    ///
    /// In origin mode the row is relative to the scroll region and clamped to it.
    pub fn move_cursor(&mut self, row: usize, col: usize) {
        self.cursor.row = if self.origin_mode {
            self.scroll_top
                .saturating_add(row)
                .min(self.scroll_bottom)
        } else {
            row.min(self.rows - 1)
        };
        self.cursor.col = col.min(self.cols - 1);
        self.cursor.pending_wrap = false;
    }

    /// Move to an absolute column on the current row
    pub fn set_col(&mut self, col: usize) {
        self.cursor.col = col.min(self.cols - 1);
        self.cursor.pending_wrap = false;
    }

    /// CUU: stops at the top margin when starting inside the region
    pub fn move_up(&mut self, n: usize) {
        let floor = if self.cursor.row >= self.scroll_top {
            self.scroll_top
        } else {
            0
        };
        self.cursor.row = self.cursor.row.saturating_sub(n).max(floor);
        self.cursor.pending_wrap = false;
    }

    /// CUD: stops at the bottom margin when starting inside the region
    pub fn move_down(&mut self, n: usize) {
        let ceiling = if self.cursor.row <= self.scroll_bottom {
            self.scroll_bottom
        } else {
            self.rows - 1
        };
        self.cursor.row = self.cursor.row.saturating_add(n).min(ceiling);
        self.cursor.pending_wrap = false;
    }

    pub fn move_left(&mut self, n: usize) {
        self.cursor.col = self.cursor.col.saturating_sub(n);
        self.cursor.pending_wrap = false;
    }

    pub fn move_right(&mut self, n: usize) {
        self.cursor.col = self.cursor.col.saturating_add(n).min(self.cols - 1);
        self.cursor.pending_wrap = false;
    }

    /// Scroll the region up by `n` rows, blank rows entering at the bottom.
    ///
    /// Rows leaving the top are archived into `history` only when the region
    /// starts at the top of the grid; rows scrolled out of an interior region
    /// are discarded.
    pub fn scroll_up(&mut self, n: usize, history: Option<&mut Scrollback>) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top + 1);
        if n == 0 {
            return;
        }
        let blank = self.cursor.attrs.blank();
        let cols = self.cols;
        let evicted: Vec<Line> = self.lines.drain(top..top + n).collect();
        let at = bottom + 1 - n;
        self.lines
            .splice(at..at, (0..n).map(|_| Line::blank(cols, blank)));

        if top == 0 {
            if let Some(history) = history {
                for line in evicted {
                    history.append(line);
                }
            }
        }
    }

    /// Scroll the region down by `n` rows, blank rows entering at the top
    pub fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top + 1);
        if n == 0 {
            return;
        }
        let blank = self.cursor.attrs.blank();
        self.lines.drain(bottom + 1 - n..=bottom);
        for _ in 0..n {
            self.lines.insert(top, Line::blank(self.cols, blank));
        }
    }

    /// IL: insert blank rows at the cursor, inside the scroll region only
    pub fn insert_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let n = n.min(self.scroll_bottom - row + 1);
        let blank = self.cursor.attrs.blank();
        self.lines.drain(self.scroll_bottom + 1 - n..=self.scroll_bottom);
        for _ in 0..n {
            self.lines.insert(row, Line::blank(self.cols, blank));
        }
        self.carriage_return();
    }

    /// DL: delete rows at the cursor, inside the scroll region only
    pub fn delete_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let n = n.min(self.scroll_bottom - row + 1);
        let blank = self.cursor.attrs.blank();
        self.lines.drain(row..row + n);
        for _ in 0..n {
            self.lines
                .insert(self.scroll_bottom + 1 - n, Line::blank(self.cols, blank));
        }
        self.carriage_return();
    }

    /// ICH
    pub fn insert_cells(&mut self, n: usize) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        let blank = self.cursor.attrs.blank();
        self.lines[row].insert_cells(col, n, blank);
        self.cursor.pending_wrap = false;
    }

    /// DCH
    pub fn delete_cells(&mut self, n: usize) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        let blank = self.cursor.attrs.blank();
        self.lines[row].delete_cells(col, n, blank);
        self.cursor.pending_wrap = false;
    }

    /// ECH: blank `n` cells from the cursor without shifting
    pub fn erase_cells(&mut self, n: usize) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        let blank = self.cursor.attrs.blank();
        self.lines[row].erase_range(col, col.saturating_add(n), blank);
    }

    /// Erase part of the cursor's row or of the whole grid
    pub fn erase(&mut self, scope: EraseScope, mode: EraseMode) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        let blank = self.cursor.attrs.blank();
        let cols = self.cols;

        match (scope, mode) {
            (EraseScope::Line, EraseMode::ToEnd) => {
                let line = &mut self.lines[row];
                line.erase_range(col, cols, blank);
                line.wrapped = false;
            }
            (EraseScope::Line, EraseMode::ToStart) => {
                self.lines[row].erase_range(0, col + 1, blank);
            }
            (EraseScope::Line, EraseMode::All) => {
                self.lines[row].clear(blank);
            }
            (EraseScope::Display, EraseMode::ToEnd) => {
                let line = &mut self.lines[row];
                line.erase_range(col, cols, blank);
                line.wrapped = false;
                for line in &mut self.lines[row + 1..] {
                    line.clear(blank);
                }
            }
            (EraseScope::Display, EraseMode::ToStart) => {
                for line in &mut self.lines[..row] {
                    line.clear(blank);
                }
                self.lines[row].erase_range(0, col + 1, blank);
            }
            (EraseScope::Display, EraseMode::All) => {
                for line in &mut self.lines {
                    line.clear(blank);
                }
            }
        }
    }

    /// DECSTBM with 0-indexed inclusive bounds. An invalid region resets to
    /// the full grid. The cursor goes home either way.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        if top < bottom && bottom < self.rows {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else {
            self.scroll_top = 0;
            self.scroll_bottom = self.rows - 1;
        }
        self.move_cursor(0, 0);
    }

    /// Truncate or pad rows and columns. Wrapped text is never reflowed.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        if cols == self.cols && rows == self.rows {
            return;
        }
        for line in &mut self.lines {
            line.resize(cols);
        }
        self.lines.resize_with(rows, || Line::new(cols));
        self.cols = cols;
        self.rows = rows;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.cursor.row = self.cursor.row.min(rows - 1);
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.cursor.pending_wrap = false;
    }

    /// Blank every cell, reset the region and home the cursor
    pub fn clear(&mut self) {
        for line in &mut self.lines {
            line.clear(CellAttributes::default());
        }
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.cursor.row = 0;
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    /// DECALN: fill the grid with `c`
    pub fn fill(&mut self, c: char) {
        for line in &mut self.lines {
            for cell in &mut line.cells {
                cell.erase(CellAttributes::default());
                cell.set_char(c);
            }
            line.wrapped = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Color;

    fn print(grid: &mut Grid, text: &str, history: &mut Scrollback) {
        for c in text.chars() {
            let attrs = grid.cursor.attrs;
            grid.write_cell(c, attrs, Some(history));
        }
    }

    #[test]
    fn test_write_and_advance() {
        let mut grid = Grid::new(80, 24);
        let mut sb = Scrollback::new(10);
        print(&mut grid, "Hi", &mut sb);
        assert_eq!(grid.line(0).unwrap().text(), "Hi");
        assert_eq!((grid.cursor.row, grid.cursor.col), (0, 2));
    }

    #[test]
    fn test_autowrap_defers_until_next_char() {
        let mut grid = Grid::new(10, 3);
        let mut sb = Scrollback::new(10);
        print(&mut grid, "0123456789", &mut sb);
        assert_eq!((grid.cursor.row, grid.cursor.col), (0, 9));
        assert!(grid.cursor.pending_wrap);

        print(&mut grid, "X", &mut sb);
        assert_eq!(grid.cell(1, 0).unwrap().display_char(), 'X');
        assert!(grid.line(0).unwrap().wrapped);
        assert_eq!((grid.cursor.row, grid.cursor.col), (1, 1));
    }

    #[test]
    fn test_no_autowrap_overwrites_last_column() {
        let mut grid = Grid::new(5, 2);
        grid.autowrap = false;
        let mut sb = Scrollback::new(10);
        print(&mut grid, "abcdefg", &mut sb);
        assert_eq!(grid.line(0).unwrap().text(), "abcdg");
        assert_eq!(grid.line(1).unwrap().text(), "");
    }

    #[test]
    fn test_wide_char_wraps_instead_of_straddling() {
        let mut grid = Grid::new(5, 2);
        let mut sb = Scrollback::new(10);
        print(&mut grid, "abcd中", &mut sb);
        assert_eq!(grid.line(0).unwrap().text(), "abcd");
        assert!(grid.cell(1, 0).unwrap().is_wide());
        assert!(grid.cell(1, 1).unwrap().is_continuation());
        assert_eq!(grid.cursor.col, 2);
    }

    #[test]
    fn test_overwrite_half_of_wide_char() {
        let mut grid = Grid::new(6, 1);
        let mut sb = Scrollback::new(10);
        print(&mut grid, "中", &mut sb);
        grid.move_cursor(0, 1);
        print(&mut grid, "x", &mut sb);
        assert!(grid.cell(0, 0).unwrap().is_empty());
        assert!(!grid.cell(0, 0).unwrap().is_wide());
        assert_eq!(grid.cell(0, 1).unwrap().display_char(), 'x');
    }

    #[test]
    fn test_combining_mark_joins_previous_cell() {
        let mut grid = Grid::new(10, 1);
        let mut sb = Scrollback::new(10);
        print(&mut grid, "e\u{0301}x", &mut sb);
        assert_eq!(grid.cell(0, 0).unwrap().content(), "e\u{0301}");
        assert_eq!(grid.cell(0, 1).unwrap().display_char(), 'x');
    }

    #[test]
    fn test_scroll_up_archives_full_screen_rows() {
        let mut grid = Grid::new(10, 3);
        let mut sb = Scrollback::new(10);
        for text in ["1", "2", "3"] {
            print(&mut grid, text, &mut sb);
            grid.carriage_return();
            grid.linefeed(Some(&mut sb));
        }
        assert_eq!(sb.line_count(), 1);
        assert_eq!(sb.get(0).unwrap().text(), "1");
        assert_eq!(grid.line(0).unwrap().text(), "2");
        assert_eq!(grid.line(2).unwrap().text(), "");
    }

    #[test]
    fn test_interior_region_discards_rows() {
        let mut grid = Grid::new(10, 5);
        let mut sb = Scrollback::new(10);
        for row in 0..5 {
            grid.move_cursor(row, 0);
            print(&mut grid, &row.to_string(), &mut sb);
        }
        grid.set_scroll_region(1, 3);
        grid.scroll_up(1, Some(&mut sb));
        assert!(sb.is_empty());
        let texts: Vec<String> = grid.lines().iter().map(Line::text).collect();
        assert_eq!(texts, vec!["0", "2", "3", "", "4"]);
    }

    #[test]
    fn test_scroll_down_in_region() {
        let mut grid = Grid::new(10, 4);
        let mut sb = Scrollback::new(10);
        for row in 0..4 {
            grid.move_cursor(row, 0);
            print(&mut grid, &row.to_string(), &mut sb);
        }
        grid.set_scroll_region(1, 2);
        grid.scroll_down(1);
        let texts: Vec<String> = grid.lines().iter().map(Line::text).collect();
        assert_eq!(texts, vec!["0", "", "1", "3"]);
    }

    #[test]
    fn test_erase_keeps_background() {
        let mut grid = Grid::new(4, 2);
        let mut sb = Scrollback::new(10);
        print(&mut grid, "abcd", &mut sb);
        grid.cursor.attrs.bg = Color::BLUE;
        grid.erase(EraseScope::Display, EraseMode::All);
        let cell = grid.cell(0, 0).unwrap();
        assert!(cell.is_empty());
        assert_eq!(cell.attrs.bg, Color::BLUE);
    }

    #[test]
    fn test_erase_line_modes() {
        let mut grid = Grid::new(10, 1);
        let mut sb = Scrollback::new(10);
        print(&mut grid, "ABCDEFGHIJ", &mut sb);
        grid.move_cursor(0, 5);
        grid.erase(EraseScope::Line, EraseMode::ToEnd);
        assert_eq!(grid.line(0).unwrap().text(), "ABCDE");
        grid.move_cursor(0, 1);
        grid.erase(EraseScope::Line, EraseMode::ToStart);
        assert_eq!(grid.line(0).unwrap().text(), "  CDE");
    }

    #[test]
    fn test_insert_delete_lines() {
        let mut grid = Grid::new(10, 5);
        let mut sb = Scrollback::new(10);
        for row in 0..5 {
            grid.move_cursor(row, 0);
            print(&mut grid, &row.to_string(), &mut sb);
        }
        grid.move_cursor(2, 0);
        grid.insert_lines(2);
        let texts: Vec<String> = grid.lines().iter().map(Line::text).collect();
        assert_eq!(texts, vec!["0", "1", "", "", "2"]);

        grid.delete_lines(2);
        let texts: Vec<String> = grid.lines().iter().map(Line::text).collect();
        assert_eq!(texts, vec!["0", "1", "2", "", ""]);
    }

    #[test]
    fn test_move_cursor_clamps() {
        let mut grid = Grid::new(10, 5);
        grid.move_cursor(100, 100);
        assert_eq!((grid.cursor.row, grid.cursor.col), (4, 9));
    }

    #[test]
    fn test_origin_mode_addresses_region() {
        let mut grid = Grid::new(10, 10);
        grid.set_scroll_region(2, 5);
        grid.origin_mode = true;
        grid.move_cursor(0, 0);
        assert_eq!(grid.cursor.row, 2);
        grid.move_cursor(20, 0);
        assert_eq!(grid.cursor.row, 5);
    }

    #[test]
    fn test_resize_truncates_then_pads() {
        let mut grid = Grid::new(8, 3);
        let mut sb = Scrollback::new(10);
        print(&mut grid, "ABCDEFGH", &mut sb);
        grid.resize(4, 3);
        assert_eq!(grid.line(0).unwrap().text(), "ABCD");
        assert!(grid.cursor.col < 4);
        grid.resize(8, 5);
        assert_eq!(grid.line(0).unwrap().len(), 8);
        assert_eq!(grid.line(0).unwrap().text(), "ABCD");
        assert_eq!(grid.rows(), 5);
        assert_eq!(grid.scroll_region(), (0, 4));
    }
}
