//! Terminal Core Module
//!
//! Platform-independent terminal state management. This module contains:
//! - Cell representation with attributes and colors
//! - The grid of visible cells with its cursor and scroll region
//! - Scrollback buffer
//! - Screen model (primary and alternate grids, tabs, charsets, modes)
//! - Render snapshots and the serialized scrollback line format
//!
//! The core is deterministic: given the same sequence of terminal actions,
//! it always produces the same state.

mod cell;
mod charset;
mod color;
mod cursor;
mod grid;
mod hyperlink;
mod line;
mod modes;
mod screen;
mod scrollback;
mod snapshot;

pub use cell::{char_width, Cell, CellAttributes};
pub use charset::{Charset, CharsetState};
pub use color::{index_to_rgb, Color};
pub use cursor::{Cursor, CursorStyle, SavedCursor};
pub use grid::{EraseMode, EraseScope, Grid};
pub use hyperlink::{HyperlinkRegistry, MAX_HYPERLINKS};
pub use line::Line;
pub use modes::Modes;
pub use screen::Screen;
pub use scrollback::{Scrollback, ScrollbackError, ScrollbackLine};
pub use snapshot::{CursorSnapshot, RenderSnapshot, StyleSpan, StyledLine};
