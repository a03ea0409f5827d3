//! Terminal mode flags that live outside the grid

use serde::{Deserialize, Serialize};

/// Modes toggled by SM/RM and DECSET/DECRST.
///
/// Autowrap, origin and insert mode are per-grid state and live on
/// [`Grid`](super::Grid) instead.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modes {
    /// DECCKM: cursor keys send SS3 sequences
    pub application_cursor: bool,
    /// DECKPAM / DECKPNM
    pub application_keypad: bool,
    /// xterm 2004
    pub bracketed_paste: bool,
    /// xterm 1004
    pub focus_reporting: bool,
    /// LNM: LF also performs CR
    pub linefeed_mode: bool,
}
