//! Snapshots handed to collaborators
//!
//! [`RenderSnapshot`] is the consistent, read-only copy of the visible
//! screen given to renderers. [`StyledLine`] is the session-save format for
//! scrollback rows: plain text plus attribute spans over cell columns.

use serde::{Deserialize, Serialize};

use super::cell::{char_width, Cell, CellAttributes};
use super::cursor::CursorStyle;
use super::line::Line;
use super::screen::Screen;
use super::scrollback::ScrollbackLine;

/// The visible screen at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub cols: usize,
    pub rows: usize,
    /// One entry per visible row, top to bottom
    pub lines: Vec<Vec<Cell>>,
    pub cursor: CursorSnapshot,
    pub title: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub alternate_screen: bool,
    pub scrollback_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSnapshot {
    pub row: usize,
    pub col: usize,
    pub visible: bool,
    pub style: CursorStyle,
    pub blinking: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl RenderSnapshot {
    pub fn from_screen(screen: &Screen, title: &str) -> Self {
        let grid = screen.grid();
        let cursor = &grid.cursor;
        Self {
            cols: grid.cols(),
            rows: grid.rows(),
            lines: grid.lines().iter().map(|line| line.cells.clone()).collect(),
            cursor: CursorSnapshot {
                row: cursor.row,
                col: cursor.col,
                visible: cursor.visible,
                style: cursor.style,
                blinking: cursor.blinking,
            },
            title: title.to_string(),
            alternate_screen: screen.is_alternate(),
            scrollback_lines: screen.scrollback().line_count(),
        }
    }

    /// Text of one row with trailing blanks trimmed
    pub fn row_text(&self, row: usize) -> String {
        let Some(cells) = self.lines.get(row) else {
            return String::new();
        };
        let mut s: String = cells
            .iter()
            .filter(|c| !c.is_continuation())
            .map(|c| if c.is_empty() { " " } else { c.content() })
            .collect();
        s.truncate(s.trim_end().len());
        s
    }

    /// All rows joined by newlines
    pub fn to_text(&self) -> String {
        (0..self.rows)
            .map(|row| self.row_text(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.lines.get(row)?.get(col)
    }
}

/// A run of cell columns `[start, end)` sharing non-default attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSpan {
    pub start: usize,
    pub end: usize,
    pub attrs: CellAttributes,
}

/// A serialized scrollback row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrapped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<StyleSpan>,
}

impl StyledLine {
    /// Encode a row of cells. Trailing unstyled blanks are dropped.
    pub fn from_cells(cells: &[Cell], wrapped: bool) -> Self {
        let default = CellAttributes::default();
        let end = cells
            .iter()
            .rposition(|c| !c.is_empty() || c.attrs != default)
            .map_or(0, |i| i + 1);
        let cells = &cells[..end];

        let mut text = String::with_capacity(cells.len());
        for cell in cells.iter().filter(|c| !c.is_continuation()) {
            if cell.is_empty() {
                text.push(' ');
            } else {
                text.push_str(cell.content());
            }
        }

        let mut spans: Vec<StyleSpan> = Vec::new();
        for (col, cell) in cells.iter().enumerate() {
            if cell.attrs == default {
                continue;
            }
            match spans.last_mut() {
                Some(span) if span.end == col && span.attrs == cell.attrs => span.end = col + 1,
                _ => spans.push(StyleSpan {
                    start: col,
                    end: col + 1,
                    attrs: cell.attrs,
                }),
            }
        }

        Self {
            text,
            wrapped,
            spans,
        }
    }

    /// Rebuild cells from the text, then apply the spans
    pub fn to_line(&self) -> Line {
        let mut cells: Vec<Cell> = Vec::with_capacity(self.text.len());
        for c in self.text.chars() {
            match char_width(c) {
                0 => {
                    if let Some(prev) = cells.iter_mut().rev().find(|c| !c.is_continuation()) {
                        prev.push_combining(c);
                    }
                }
                2 => {
                    cells.push(Cell::new(c));
                    let mut tail = Cell::default();
                    tail.set_continuation(CellAttributes::default(), 0);
                    cells.push(tail);
                }
                _ if c == ' ' => cells.push(Cell::default()),
                _ => cells.push(Cell::new(c)),
            }
        }
        for span in &self.spans {
            let end = span.end.min(cells.len());
            for cell in cells.iter_mut().take(end).skip(span.start) {
                cell.attrs = span.attrs;
            }
        }
        Line::from_cells(cells, self.wrapped)
    }
}

impl From<&ScrollbackLine> for StyledLine {
    fn from(line: &ScrollbackLine) -> Self {
        StyledLine::from_cells(line.cells(), line.wrapped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Color;

    #[test]
    fn test_snapshot_text_and_cursor() {
        let mut screen = Screen::new(10, 3, 0);
        "hi".chars().for_each(|c| screen.print(c));
        let snap = RenderSnapshot::from_screen(&screen, "t");
        assert_eq!(snap.row_text(0), "hi");
        assert_eq!(snap.to_text(), "hi\n\n");
        assert_eq!((snap.cursor.row, snap.cursor.col), (0, 2));
        assert!(snap.cursor.visible);
        assert_eq!(snap.title, "t");
    }

    #[test]
    fn test_styled_line_spans() {
        let red = CellAttributes {
            fg: Color::RED,
            ..CellAttributes::default()
        };
        let mut line = Line::new(10);
        for (col, c) in "ab cd".chars().enumerate() {
            if c != ' ' {
                line.cells[col].set_char(c);
            }
        }
        line.cells[3].attrs = red;
        line.cells[4].attrs = red;

        let styled = StyledLine::from_cells(&line.cells, false);
        assert_eq!(styled.text, "ab cd");
        assert_eq!(
            styled.spans,
            vec![StyleSpan {
                start: 3,
                end: 5,
                attrs: red
            }]
        );

        let restored = styled.to_line();
        assert_eq!(restored.text(), "ab cd");
        assert_eq!(restored.cells[3].attrs, red);
        assert_eq!(restored.cells[2].attrs, CellAttributes::default());
    }

    #[test]
    fn test_styled_line_wide_chars() {
        let styled = StyledLine {
            text: "中a".into(),
            wrapped: true,
            spans: vec![],
        };
        let line = styled.to_line();
        assert_eq!(line.len(), 3);
        assert!(line.cells[0].is_wide());
        assert!(line.cells[1].is_continuation());
        assert!(line.wrapped);
        assert_eq!(StyledLine::from_cells(&line.cells, true), styled);
    }
}
