//! Screen model implementation
//!
//! The screen owns the primary and alternate grids, the scrollback buffer
//! fed by the primary grid, tab stops, character sets and mode flags.

use std::collections::HashSet;

use tracing::debug;

use super::cell::CellAttributes;
use super::charset::CharsetState;
use super::cursor::{Cursor, SavedCursor};
use super::grid::{EraseMode, EraseScope, Grid};
use super::hyperlink::{HyperlinkRegistry, MAX_HYPERLINKS};
use super::line::Line;
use super::modes::Modes;
use super::scrollback::Scrollback;

/// Everything DECSC saves besides the position
#[derive(Debug, Clone, Copy, Default)]
struct SavedState {
    cursor: SavedCursor,
    charsets: CharsetState,
    origin_mode: bool,
}

#[derive(Debug, Clone)]
pub struct Screen {
    primary: Grid,
    alternate: Grid,
    /// Fed only by the primary grid
    scrollback: Scrollback,
    on_alternate: bool,
    saved_primary: SavedState,
    saved_alternate: SavedState,
    charsets: CharsetState,
    tab_stops: Vec<bool>,
    pub modes: Modes,
    /// OSC 8 targets referenced by cells
    hyperlinks: HyperlinkRegistry,
}

impl Screen {
    pub fn new(cols: usize, rows: usize, scrollback_capacity: usize) -> Self {
        let primary = Grid::new(cols, rows);
        let alternate = Grid::new(cols, rows);
        let tab_stops = default_tab_stops(primary.cols());
        Self {
            primary,
            alternate,
            scrollback: Scrollback::new(scrollback_capacity),
            on_alternate: false,
            saved_primary: SavedState::default(),
            saved_alternate: SavedState::default(),
            charsets: CharsetState::default(),
            tab_stops,
            modes: Modes::default(),
            hyperlinks: HyperlinkRegistry::new(),
        }
    }

    pub fn cols(&self) -> usize {
        self.grid().cols()
    }

    pub fn rows(&self) -> usize {
        self.grid().rows()
    }

    /// The grid currently displayed
    pub fn grid(&self) -> &Grid {
        if self.on_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        if self.on_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    /// Active grid plus the history it scrolls into (none for the alternate screen)
    fn active_mut(&mut self) -> (&mut Grid, Option<&mut Scrollback>) {
        if self.on_alternate {
            (&mut self.alternate, None)
        } else {
            (&mut self.primary, Some(&mut self.scrollback))
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.grid().cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.grid_mut().cursor
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    pub fn is_alternate(&self) -> bool {
        self.on_alternate
    }

    pub fn charsets_mut(&mut self) -> &mut CharsetState {
        &mut self.charsets
    }

    /// Print a character with the current pen
    pub fn print(&mut self, c: char) {
        let c = self.charsets.translate(c);
        let (grid, history) = self.active_mut();
        let attrs = grid.cursor.attrs;
        grid.write_cell(c, attrs, history);
    }

    pub fn linefeed(&mut self) {
        let linefeed_mode = self.modes.linefeed_mode;
        let (grid, history) = self.active_mut();
        grid.linefeed(history);
        if linefeed_mode {
            grid.carriage_return();
        }
    }

    /// IND: like LF but never implies CR
    pub fn index(&mut self) {
        let (grid, history) = self.active_mut();
        grid.linefeed(history);
    }

    /// NEL
    pub fn next_line(&mut self) {
        self.index();
        self.grid_mut().carriage_return();
    }

    pub fn reverse_index(&mut self) {
        self.grid_mut().reverse_index();
    }

    pub fn carriage_return(&mut self) {
        self.grid_mut().carriage_return();
    }

    pub fn backspace(&mut self) {
        self.grid_mut().backspace();
    }

    /// SU
    pub fn scroll_up(&mut self, n: usize) {
        let (grid, history) = self.active_mut();
        grid.scroll_up(n, history);
    }

    /// SD
    pub fn scroll_down(&mut self, n: usize) {
        self.grid_mut().scroll_down(n);
    }

    pub fn erase(&mut self, scope: EraseScope, mode: EraseMode) {
        self.grid_mut().erase(scope, mode);
    }

    /// ED 3
    pub fn clear_scrollback(&mut self) {
        self.scrollback.clear();
        self.sweep_hyperlinks();
    }

    /// HT: advance to the next tab stop `n` times, stopping at the last column
    pub fn tab(&mut self, n: usize) {
        let grid = self.grid_mut();
        let last = grid.cols() - 1;
        let mut col = grid.cursor.col;
        for _ in 0..n {
            match (col + 1..=last).find(|&c| self.tab_stops.get(c).copied().unwrap_or(false)) {
                Some(next) => col = next,
                None => {
                    col = last;
                    break;
                }
            }
        }
        self.grid_mut().set_col(col);
    }

    /// CBT: move back to the previous tab stop `n` times
    pub fn back_tab(&mut self, n: usize) {
        let mut col = self.cursor().col;
        for _ in 0..n {
            match (0..col).rev().find(|&c| self.tab_stops[c]) {
                Some(prev) => col = prev,
                None => {
                    col = 0;
                    break;
                }
            }
        }
        self.grid_mut().set_col(col);
    }

    /// HTS
    pub fn set_tab_stop(&mut self) {
        let col = self.cursor().col;
        if let Some(stop) = self.tab_stops.get_mut(col) {
            *stop = true;
        }
    }

    /// TBC 0
    pub fn clear_tab_stop(&mut self) {
        let col = self.cursor().col;
        if let Some(stop) = self.tab_stops.get_mut(col) {
            *stop = false;
        }
    }

    /// TBC 3
    pub fn clear_all_tab_stops(&mut self) {
        self.tab_stops.iter_mut().for_each(|stop| *stop = false);
    }

    /// DECAWM applies to both grids
    pub fn set_autowrap(&mut self, on: bool) {
        self.primary.autowrap = on;
        self.alternate.autowrap = on;
        if !on {
            self.primary.cursor.pending_wrap = false;
            self.alternate.cursor.pending_wrap = false;
        }
    }

    /// DECOM, which also homes the cursor
    pub fn set_origin_mode(&mut self, on: bool) {
        let grid = self.grid_mut();
        grid.origin_mode = on;
        grid.move_cursor(0, 0);
    }

    pub fn set_insert_mode(&mut self, on: bool) {
        self.primary.insert_mode = on;
        self.alternate.insert_mode = on;
    }

    /// DECSC
    pub fn save_cursor(&mut self) {
        let state = SavedState {
            cursor: self.cursor().save(),
            charsets: self.charsets,
            origin_mode: self.grid().origin_mode,
        };
        if self.on_alternate {
            self.saved_alternate = state;
        } else {
            self.saved_primary = state;
        }
    }

    /// DECRC. Without a prior save this homes the cursor with default attributes.
    pub fn restore_cursor(&mut self) {
        let state = if self.on_alternate {
            self.saved_alternate
        } else {
            self.saved_primary
        };
        self.charsets = state.charsets;
        let grid = self.grid_mut();
        grid.origin_mode = state.origin_mode;
        let saved = state.cursor;
        grid.cursor.row = if grid.origin_mode {
            // The region may have changed since the save
            let (top, bottom) = grid.scroll_region();
            saved.row.clamp(top, bottom)
        } else {
            saved.row.min(grid.rows() - 1)
        };
        grid.cursor.col = saved.col.min(grid.cols() - 1);
        grid.cursor.pending_wrap = saved.pending_wrap && grid.autowrap;
        grid.cursor.attrs = saved.attrs;
        grid.cursor.hyperlink_id = saved.hyperlink_id;
    }

    /// Switch to the alternate grid, which starts out blank.
    ///
    /// The pen and visibility carry over so that programs keep their colors.
    pub fn enter_alternate_screen(&mut self) {
        if self.on_alternate {
            return;
        }
        let cursor = self.primary.cursor.clone();
        self.alternate.clear();
        self.alternate.cursor = cursor;
        self.alternate.cursor.pending_wrap = false;
        self.on_alternate = true;
        debug!("entered alternate screen");
    }

    pub fn exit_alternate_screen(&mut self) {
        if !self.on_alternate {
            return;
        }
        self.on_alternate = false;
        debug!("left alternate screen");
    }

    /// Resize both grids (truncate/pad, no reflow) and rebuild tab stops
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.primary.resize(cols, rows);
        self.alternate.resize(cols, rows);
        let old = self.tab_stops.len();
        let new_cols = self.primary.cols();
        self.tab_stops.resize(new_cols, false);
        for col in (old..new_cols).filter(|c| c % 8 == 0 && *c > 0) {
            self.tab_stops[col] = true;
        }
    }

    /// RIS: back to the power-on state, scrollback included
    pub fn reset(&mut self) {
        let (cols, rows) = (self.primary.cols(), self.primary.rows());
        self.primary = Grid::new(cols, rows);
        self.alternate = Grid::new(cols, rows);
        self.scrollback.clear();
        self.on_alternate = false;
        self.saved_primary = SavedState::default();
        self.saved_alternate = SavedState::default();
        self.charsets = CharsetState::default();
        self.tab_stops = default_tab_stops(cols);
        self.modes = Modes::default();
        self.hyperlinks.clear();
    }

    /// Register an OSC 8 target and return its id (never 0).
    ///
    /// A full registry is first swept of links no cell or cursor refers to;
    /// if it is still full the oldest links are forgotten.
    pub fn register_hyperlink(&mut self, uri: String) -> u32 {
        if let Some(id) = self.hyperlinks.id_of(&uri) {
            return id;
        }
        if self.hyperlinks.is_full() {
            self.sweep_hyperlinks();
            if self.hyperlinks.is_full() {
                let excess = self.hyperlinks.len() + 1 - MAX_HYPERLINKS;
                debug!(excess, "hyperlink registry full, evicting oldest");
                self.hyperlinks.evict_oldest(excess);
            }
        }
        self.hyperlinks.intern(uri)
    }

    pub fn hyperlink(&self, id: u32) -> Option<&str> {
        self.hyperlinks.get(id)
    }

    pub fn hyperlink_count(&self) -> usize {
        self.hyperlinks.len()
    }

    /// Forget links that nothing on screen, in history or in a saved cursor
    /// still refers to
    fn sweep_hyperlinks(&mut self) {
        if self.hyperlinks.is_empty() {
            return;
        }
        let mut live = HashSet::new();
        let grid_cells = self
            .primary
            .lines()
            .iter()
            .chain(self.alternate.lines())
            .flat_map(|line| line.cells.iter());
        let history_cells = self.scrollback.iter().flat_map(|line| line.cells().iter());
        live.extend(
            grid_cells
                .chain(history_cells)
                .map(|cell| cell.hyperlink_id)
                .filter(|&id| id != 0),
        );
        live.extend([
            self.primary.cursor.hyperlink_id,
            self.alternate.cursor.hyperlink_id,
            self.saved_primary.cursor.hyperlink_id,
            self.saved_alternate.cursor.hyperlink_id,
        ]);
        self.hyperlinks.retain_live(&live);
    }

    /// Append previously serialized history. Only scrollback is restorable.
    pub fn restore_scrollback(&mut self, lines: impl IntoIterator<Item = Line>) {
        for line in lines {
            self.scrollback.append(line);
        }
    }

    /// Pen used for blanks produced by erase and scroll
    pub fn blank_attrs(&self) -> CellAttributes {
        self.cursor().attrs.blank()
    }
}

fn default_tab_stops(cols: usize) -> Vec<bool> {
    (0..cols).map(|c| c > 0 && c % 8 == 0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print_str(screen: &mut Screen, text: &str) {
        text.chars().for_each(|c| screen.print(c));
    }

    #[test]
    fn test_screen_new() {
        let screen = Screen::new(80, 24, 1000);
        assert_eq!(screen.cols(), 80);
        assert_eq!(screen.rows(), 24);
        assert_eq!((screen.cursor().row, screen.cursor().col), (0, 0));
    }

    #[test]
    fn test_tab_stops() {
        let mut screen = Screen::new(80, 24, 0);
        screen.tab(1);
        assert_eq!(screen.cursor().col, 8);
        screen.tab(2);
        assert_eq!(screen.cursor().col, 24);
        screen.back_tab(1);
        assert_eq!(screen.cursor().col, 16);

        screen.clear_all_tab_stops();
        screen.grid_mut().move_cursor(0, 5);
        screen.set_tab_stop();
        screen.carriage_return();
        screen.tab(1);
        assert_eq!(screen.cursor().col, 5);
        screen.tab(1);
        assert_eq!(screen.cursor().col, 79);
    }

    #[test]
    fn test_alternate_screen_never_archives() {
        let mut screen = Screen::new(10, 2, 100);
        print_str(&mut screen, "P");
        screen.enter_alternate_screen();
        assert!(screen.grid().line(0).unwrap().is_empty());
        for _ in 0..5 {
            screen.linefeed();
        }
        assert!(screen.scrollback().is_empty());
        screen.exit_alternate_screen();
        assert_eq!(screen.grid().line(0).unwrap().text(), "P");
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut screen = Screen::new(80, 24, 0);
        screen.grid_mut().move_cursor(10, 20);
        screen.cursor_mut().attrs.bold = true;
        screen.save_cursor();

        screen.grid_mut().move_cursor(0, 0);
        screen.cursor_mut().attrs.bold = false;
        screen.restore_cursor();

        assert_eq!((screen.cursor().row, screen.cursor().col), (10, 20));
        assert!(screen.cursor().attrs.bold);
    }

    #[test]
    fn test_restore_after_shrink_is_clamped() {
        let mut screen = Screen::new(80, 24, 0);
        screen.grid_mut().move_cursor(20, 70);
        screen.save_cursor();
        screen.resize(40, 10);
        screen.restore_cursor();
        assert_eq!((screen.cursor().row, screen.cursor().col), (9, 39));
    }

    #[test]
    fn test_linefeed_mode_implies_cr() {
        let mut screen = Screen::new(10, 3, 0);
        print_str(&mut screen, "ab");
        screen.modes.linefeed_mode = true;
        screen.linefeed();
        assert_eq!((screen.cursor().row, screen.cursor().col), (1, 0));
    }

    #[test]
    fn test_hyperlink_registry() {
        let mut screen = Screen::new(10, 3, 0);
        let a = screen.register_hyperlink("https://a".into());
        let b = screen.register_hyperlink("https://b".into());
        assert_ne!(a, b);
        assert_eq!(screen.register_hyperlink("https://a".into()), a);
        assert_eq!(screen.hyperlink(b), Some("https://b"));
        assert_eq!(screen.hyperlink(0), None);
    }

    #[test]
    fn test_resize_extends_tab_stops() {
        let mut screen = Screen::new(10, 3, 0);
        screen.resize(20, 3);
        screen.grid_mut().move_cursor(0, 9);
        screen.tab(1);
        assert_eq!(screen.cursor().col, 16);
    }
}
