//! Terminal Cell
//!
//! Represents a single cell in the terminal grid, containing a character
//! and its associated styling attributes.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

use super::color::Color;

/// Attributes that affect how a cell is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct CellAttributes {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub faint: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
}

impl CellAttributes {
    /// Reset all attributes to default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Attributes used for cells blanked by erase and scroll operations.
    ///
    /// Only the background survives (background color erase).
    pub fn blank(&self) -> Self {
        Self {
            bg: self.bg,
            ..Self::default()
        }
    }
}

/// A single cell in the terminal grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Empty for blank cells and wide-character continuations. May hold a
    /// base character followed by combining marks.
    content: String,
    pub attrs: CellAttributes,
    /// 1 for normal, 2 for the head of a wide character, 0 for its continuation
    width: u8,
    /// Hyperlink ID (0 = no hyperlink)
    pub hyperlink_id: u32,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            content: String::new(),
            attrs: CellAttributes::default(),
            width: 1,
            hyperlink_id: 0,
        }
    }
}

impl Cell {
    /// Create a cell holding a single character
    pub fn new(c: char) -> Self {
        let mut cell = Self::default();
        cell.set_char(c);
        cell
    }

    /// Blank cell carrying the given attributes
    pub fn blank(attrs: CellAttributes) -> Self {
        Self {
            attrs,
            ..Self::default()
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Put a character in this cell, replacing whatever was there
    pub fn set_char(&mut self, c: char) {
        self.content.clear();
        self.content.push(c);
        self.width = char_width(c).max(1) as u8;
    }

    /// Append a zero-width combining character
    pub fn push_combining(&mut self, c: char) {
        if !self.content.is_empty() {
            self.content.push(c);
        }
    }

    /// Turn this cell into the trailing half of a wide character
    pub fn set_continuation(&mut self, attrs: CellAttributes, hyperlink_id: u32) {
        self.content.clear();
        self.attrs = attrs;
        self.width = 0;
        self.hyperlink_id = hyperlink_id;
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn is_wide(&self) -> bool {
        self.width == 2
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// First character of the cell, or a space when blank
    pub fn display_char(&self) -> char {
        self.content.chars().next().unwrap_or(' ')
    }

    /// Reset to a blank cell with the given attributes
    pub fn erase(&mut self, attrs: CellAttributes) {
        self.content.clear();
        self.attrs = attrs;
        self.width = 1;
        self.hyperlink_id = 0;
    }
}

/// Display width of a character as the grid sees it (0, 1 or 2)
pub fn char_width(c: char) -> usize {
    c.width().unwrap_or(0).min(2)
}
