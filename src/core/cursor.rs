//! Cursor state

use serde::{Deserialize, Serialize};

use super::cell::CellAttributes;

/// Cursor visual style (DECSCUSR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorStyle {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Cursor position plus the pen used for newly printed cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
    /// The last column was just written; the next printable wraps first
    pub pending_wrap: bool,
    /// Attributes applied to subsequently printed cells
    pub attrs: CellAttributes,
    /// Active OSC 8 hyperlink (0 = none)
    pub hyperlink_id: u32,
    pub visible: bool,
    pub style: CursorStyle,
    pub blinking: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            row: 0,
            col: 0,
            pending_wrap: false,
            attrs: CellAttributes::default(),
            hyperlink_id: 0,
            visible: true,
            style: CursorStyle::Block,
            blinking: true,
        }
    }
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture what DECSC saves
    pub fn save(&self) -> SavedCursor {
        SavedCursor {
            row: self.row,
            col: self.col,
            pending_wrap: self.pending_wrap,
            attrs: self.attrs,
            hyperlink_id: self.hyperlink_id,
        }
    }
}

/// Cursor state stored by DECSC / SCOSC and restored by DECRC / SCORC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedCursor {
    pub row: usize,
    pub col: usize,
    pub pending_wrap: bool,
    pub attrs: CellAttributes,
    pub hyperlink_id: u32,
}
