//! Terminal Executor
//!
//! Ties together the parser and the screen model, applying parsed actions to
//! update the terminal state. Sequences the screen has no use for are logged
//! at `trace` level and dropped without touching the grid.

use tracing::{debug, trace};

use crate::core::{
    CellAttributes, Charset, Color, CursorStyle, EraseMode, EraseScope, RenderSnapshot, Screen,
    ScrollbackError, StyledLine,
};
use crate::parser::{Action, CsiAction, DynamicColor, EscAction, OscAction, Params, Parser};

/// Reply to primary DA: VT220 with ANSI color
const PRIMARY_DA: &[u8] = b"\x1b[?62;22c";
/// Reply to secondary DA
const SECONDARY_DA: &[u8] = b"\x1b[>1;10;0c";

const DEFAULT_FOREGROUND: (u8, u8, u8) = (229, 229, 229);
const DEFAULT_BACKGROUND: (u8, u8, u8) = (0, 0, 0);

/// Colors reported by OSC 10/11/12 queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicColors {
    pub foreground: (u8, u8, u8),
    pub background: (u8, u8, u8),
    pub cursor: (u8, u8, u8),
}

impl Default for DynamicColors {
    fn default() -> Self {
        Self {
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
            cursor: DEFAULT_FOREGROUND,
        }
    }
}

impl DynamicColors {
    fn get(&self, kind: DynamicColor) -> (u8, u8, u8) {
        match kind {
            DynamicColor::Foreground => self.foreground,
            DynamicColor::Background => self.background,
            DynamicColor::Cursor => self.cursor,
        }
    }

    fn slot(&mut self, kind: DynamicColor) -> &mut (u8, u8, u8) {
        match kind {
            DynamicColor::Foreground => &mut self.foreground,
            DynamicColor::Background => &mut self.background,
            DynamicColor::Cursor => &mut self.cursor,
        }
    }
}

/// Terminal executor that processes parsed actions and updates the screen
#[derive(Debug, Clone)]
pub struct Terminal {
    screen: Screen,
    parser: Parser,
    title: String,
    icon_name: String,
    /// Reported through OSC 7
    working_directory: Option<String>,
    colors: DynamicColors,
    bell_count: u64,
    /// Target of REP
    last_printed: Option<char>,
    /// Device replies waiting to be written back to the PTY
    pending_responses: Vec<u8>,
}

impl Terminal {
    pub fn new(cols: usize, rows: usize, scrollback_capacity: usize) -> Self {
        Self {
            screen: Screen::new(cols, rows, scrollback_capacity),
            parser: Parser::new(),
            title: String::new(),
            icon_name: String::new(),
            working_directory: None,
            colors: DynamicColors::default(),
            bell_count: 0,
            last_printed: None,
            pending_responses: Vec::new(),
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon_name(&self) -> &str {
        &self.icon_name
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    pub fn colors(&self) -> DynamicColors {
        self.colors
    }

    /// Number of BEL characters received so far
    pub fn bell_count(&self) -> u64 {
        self.bell_count
    }

    /// Feed bytes from the PTY, in the order received
    pub fn process(&mut self, data: &[u8]) {
        let mut parser = std::mem::take(&mut self.parser);
        parser.parse(data, |action| self.apply_action(action));
        self.parser = parser;
    }

    pub fn has_pending_responses(&self) -> bool {
        !self.pending_responses.is_empty()
    }

    /// Drain queued device replies (DSR, DA, color queries)
    pub fn take_pending_responses(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending_responses)
    }

    /// Resize the screen. Content is truncated or padded, never reflowed.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.screen.resize(cols, rows);
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot::from_screen(&self.screen, &self.title)
    }

    /// Styled copies of scrollback lines `[start, end)`, oldest first
    pub fn serialize_scrollback_window(
        &self,
        start: usize,
        end: usize,
    ) -> Result<Vec<StyledLine>, ScrollbackError> {
        let scrollback = self.screen.scrollback();
        (start..end)
            .map(|index| scrollback.get(index).map(StyledLine::from))
            .collect()
    }

    /// Append serialized lines to the scrollback. The grid is left alone.
    pub fn restore_scrollback<'a>(&mut self, lines: impl IntoIterator<Item = &'a StyledLine>) {
        self.screen
            .restore_scrollback(lines.into_iter().map(StyledLine::to_line));
    }

    fn queue_response(&mut self, bytes: &[u8]) {
        self.pending_responses.extend_from_slice(bytes);
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::Print(c) => {
                self.screen.print(c);
                self.last_printed = Some(c);
            }
            Action::Execute(byte) => self.execute_c0(byte),
            Action::Esc(esc) => self.execute_esc(esc),
            Action::Csi(csi) => self.execute_csi(&csi),
            Action::Osc(osc) => self.execute_osc(osc),
        }
    }

    fn execute_c0(&mut self, byte: u8) {
        match byte {
            0x07 => {
                self.bell_count += 1;
                trace!("bell");
            }
            0x08 => self.screen.backspace(),
            0x09 => self.screen.tab(1),
            // LF, VT and FF all behave as LF
            0x0A..=0x0C => self.screen.linefeed(),
            0x0D => self.screen.carriage_return(),
            0x0E => self.screen.charsets_mut().shift_out(),
            0x0F => self.screen.charsets_mut().shift_in(),
            _ => {}
        }
    }

    fn execute_esc(&mut self, esc: EscAction) {
        match esc {
            EscAction::SaveCursor => self.screen.save_cursor(),
            EscAction::RestoreCursor => self.screen.restore_cursor(),
            EscAction::Index => self.screen.index(),
            EscAction::NextLine => self.screen.next_line(),
            EscAction::ReverseIndex => self.screen.reverse_index(),
            EscAction::HorizontalTabSet => self.screen.set_tab_stop(),
            EscAction::FullReset => self.full_reset(),
            EscAction::ApplicationKeypad => self.screen.modes.application_keypad = true,
            EscAction::NormalKeypad => self.screen.modes.application_keypad = false,
            EscAction::DesignateCharset { slot, charset } => {
                match Charset::from_designator(charset) {
                    Some(set) => self.screen.charsets_mut().designate(slot as usize, set),
                    None => trace!(slot, charset = %charset, "unsupported charset"),
                }
            }
            EscAction::ScreenAlignment => {
                let grid = self.screen.grid_mut();
                let rows = grid.rows();
                grid.set_scroll_region(0, rows - 1);
                grid.fill('E');
            }
        }
    }

    fn full_reset(&mut self) {
        debug!("full reset");
        self.screen.reset();
        self.title.clear();
        self.icon_name.clear();
        self.working_directory = None;
        self.colors = DynamicColors::default();
        self.last_printed = None;
    }

    fn execute_csi(&mut self, csi: &CsiAction) {
        match (csi.marker, csi.intermediates.as_slice()) {
            (None, []) => self.execute_csi_ansi(csi),
            (Some(b'?'), []) => match csi.final_byte {
                b'h' => self.set_dec_modes(&csi.params, true),
                b'l' => self.set_dec_modes(&csi.params, false),
                _ => trace!(final_byte = csi.final_byte, "ignored private CSI"),
            },
            (Some(b'>'), []) if csi.final_byte == b'c' => self.queue_response(SECONDARY_DA),
            (None, [b' ']) if csi.final_byte == b'q' => self.set_cursor_style(csi.param(0, 0)),
            _ => trace!(
                marker = ?csi.marker,
                intermediates = ?csi.intermediates,
                final_byte = csi.final_byte,
                "ignored CSI"
            ),
        }
    }

    fn execute_csi_ansi(&mut self, csi: &CsiAction) {
        let rows = self.screen.rows();
        let cols = self.screen.cols();
        // Counts are clamped to the grid so degenerate input stays cheap
        let count = |max: usize| (csi.param(0, 1) as usize).min(max);

        match csi.final_byte {
            b'@' => self.screen.grid_mut().insert_cells(count(cols)),
            b'A' => self.screen.grid_mut().move_up(count(rows)),
            b'B' | b'e' => self.screen.grid_mut().move_down(count(rows)),
            b'C' | b'a' => self.screen.grid_mut().move_right(count(cols)),
            b'D' => self.screen.grid_mut().move_left(count(cols)),
            b'E' => {
                let grid = self.screen.grid_mut();
                grid.move_down(count(rows));
                grid.carriage_return();
            }
            b'F' => {
                let grid = self.screen.grid_mut();
                grid.move_up(count(rows));
                grid.carriage_return();
            }
            b'G' | b'`' => self.screen.grid_mut().set_col(csi.param(0, 1) as usize - 1),
            b'H' | b'f' => {
                let row = csi.param(0, 1) as usize - 1;
                let col = csi.param(1, 1) as usize - 1;
                self.screen.grid_mut().move_cursor(row, col);
            }
            b'I' => self.screen.tab(count(cols)),
            b'J' => match csi.param(0, 0) {
                0 => self.screen.erase(EraseScope::Display, EraseMode::ToEnd),
                1 => self.screen.erase(EraseScope::Display, EraseMode::ToStart),
                2 => self.screen.erase(EraseScope::Display, EraseMode::All),
                3 => self.screen.clear_scrollback(),
                mode => trace!(mode, "ignored ED mode"),
            },
            b'K' => match csi.param(0, 0) {
                0 => self.screen.erase(EraseScope::Line, EraseMode::ToEnd),
                1 => self.screen.erase(EraseScope::Line, EraseMode::ToStart),
                2 => self.screen.erase(EraseScope::Line, EraseMode::All),
                mode => trace!(mode, "ignored EL mode"),
            },
            b'L' => self.screen.grid_mut().insert_lines(count(rows)),
            b'M' => self.screen.grid_mut().delete_lines(count(rows)),
            b'P' => self.screen.grid_mut().delete_cells(count(cols)),
            b'S' => self.screen.scroll_up(count(rows)),
            b'T' => self.screen.scroll_down(count(rows)),
            b'X' => self.screen.grid_mut().erase_cells(count(cols)),
            b'Z' => self.screen.back_tab(count(cols)),
            b'b' => {
                if let Some(c) = self.last_printed {
                    for _ in 0..count(cols * rows) {
                        self.screen.print(c);
                    }
                }
            }
            b'c' => {
                if csi.param(0, 0) == 0 {
                    self.queue_response(PRIMARY_DA);
                }
            }
            b'd' => {
                let grid = self.screen.grid_mut();
                let col = grid.cursor.col;
                grid.move_cursor(csi.param(0, 1) as usize - 1, col);
            }
            b'g' => match csi.param(0, 0) {
                0 => self.screen.clear_tab_stop(),
                3 => self.screen.clear_all_tab_stops(),
                _ => {}
            },
            b'h' => self.set_ansi_modes(&csi.params, true),
            b'l' => self.set_ansi_modes(&csi.params, false),
            b'm' => {
                let attrs = &mut self.screen.cursor_mut().attrs;
                apply_sgr(attrs, &csi.params);
            }
            b'n' => self.device_status_report(csi.param(0, 0)),
            b'r' => {
                let top = csi.param(0, 1) as usize - 1;
                let bottom = csi.params.get(1).map_or(rows, usize::from) - 1;
                self.screen.grid_mut().set_scroll_region(top, bottom);
            }
            b's' => self.screen.save_cursor(),
            b'u' => self.screen.restore_cursor(),
            other => trace!(final_byte = other, "ignored CSI"),
        }
    }

    fn device_status_report(&mut self, request: u16) {
        match request {
            5 => self.queue_response(b"\x1b[0n"),
            6 => {
                let grid = self.screen.grid();
                let (top, _) = grid.scroll_region();
                let row = if grid.origin_mode {
                    grid.cursor.row.saturating_sub(top)
                } else {
                    grid.cursor.row
                };
                let reply = format!("\x1b[{};{}R", row + 1, grid.cursor.col + 1);
                self.queue_response(reply.as_bytes());
            }
            other => trace!(request = other, "ignored DSR"),
        }
    }

    fn set_ansi_modes(&mut self, params: &Params, enable: bool) {
        for mode in params.iter() {
            match mode {
                4 => self.screen.set_insert_mode(enable),
                20 => self.screen.modes.linefeed_mode = enable,
                other => trace!(mode = other, enable, "ignored ANSI mode"),
            }
        }
    }

    fn set_dec_modes(&mut self, params: &Params, enable: bool) {
        for mode in params.iter() {
            match mode {
                1 => self.screen.modes.application_cursor = enable,
                6 => self.screen.set_origin_mode(enable),
                7 => self.screen.set_autowrap(enable),
                12 => self.screen.cursor_mut().blinking = enable,
                25 => self.screen.cursor_mut().visible = enable,
                47 | 1047 => {
                    if enable {
                        self.screen.enter_alternate_screen();
                    } else {
                        self.screen.exit_alternate_screen();
                    }
                }
                1048 => {
                    if enable {
                        self.screen.save_cursor();
                    } else {
                        self.screen.restore_cursor();
                    }
                }
                1049 => {
                    if enable {
                        self.screen.save_cursor();
                        self.screen.enter_alternate_screen();
                    } else {
                        self.screen.exit_alternate_screen();
                        self.screen.restore_cursor();
                    }
                }
                1004 => self.screen.modes.focus_reporting = enable,
                2004 => self.screen.modes.bracketed_paste = enable,
                other => trace!(mode = other, enable, "ignored DEC mode"),
            }
        }
    }

    /// DECSCUSR
    fn set_cursor_style(&mut self, style: u16) {
        let (style, blinking) = match style {
            0 | 1 => (CursorStyle::Block, true),
            2 => (CursorStyle::Block, false),
            3 => (CursorStyle::Underline, true),
            4 => (CursorStyle::Underline, false),
            5 => (CursorStyle::Bar, true),
            6 => (CursorStyle::Bar, false),
            other => {
                trace!(style = other, "ignored cursor style");
                return;
            }
        };
        let cursor = self.screen.cursor_mut();
        cursor.style = style;
        cursor.blinking = blinking;
    }

    fn execute_osc(&mut self, osc: OscAction) {
        match osc {
            OscAction::SetIconAndTitle(text) => {
                self.icon_name = text.clone();
                self.title = text;
            }
            OscAction::SetIconName(text) => self.icon_name = text,
            OscAction::SetTitle(text) => self.title = text,
            OscAction::SetWorkingDirectory(uri) => self.working_directory = Some(uri),
            OscAction::Hyperlink { uri, .. } => {
                let id = if uri.is_empty() {
                    0
                } else {
                    self.screen.register_hyperlink(uri)
                };
                self.screen.cursor_mut().hyperlink_id = id;
            }
            OscAction::QueryColor(kind) => {
                let (r, g, b) = self.colors.get(kind);
                let code = match kind {
                    DynamicColor::Foreground => 10,
                    DynamicColor::Background => 11,
                    DynamicColor::Cursor => 12,
                };
                let reply = format!(
                    "\x1b]{code};rgb:{:04x}/{:04x}/{:04x}\x1b\\",
                    u16::from(r) * 257,
                    u16::from(g) * 257,
                    u16::from(b) * 257
                );
                self.queue_response(reply.as_bytes());
            }
            OscAction::SetColor(kind, spec) => match parse_color_spec(&spec) {
                Some(rgb) => *self.colors.slot(kind) = rgb,
                None => trace!(spec = %spec, "unparsable color"),
            },
            OscAction::ResetColor(kind) => {
                *self.colors.slot(kind) = DynamicColors::default().get(kind);
            }
            // No palette overrides are kept, so there is nothing to reset
            OscAction::ResetPalette(_) => {}
            OscAction::Unknown { command, .. } => trace!(?command, "ignored OSC"),
        }
    }
}

/// Apply SGR parameters to the pen. An empty list resets it.
fn apply_sgr(attrs: &mut CellAttributes, params: &Params) {
    if params.is_empty() {
        attrs.reset();
        return;
    }

    let mut i = 0;
    while i < params.len() {
        match params.raw(i) {
            0 => attrs.reset(),
            1 => attrs.bold = true,
            2 => attrs.faint = true,
            3 => attrs.italic = true,
            4 => attrs.underline = params.subparams(i).first() != Some(&0),
            5 | 6 => attrs.blink = true,
            7 => attrs.inverse = true,
            8 => attrs.hidden = true,
            9 => attrs.strikethrough = true,
            21 => attrs.underline = true,
            22 => {
                attrs.bold = false;
                attrs.faint = false;
            }
            23 => attrs.italic = false,
            24 => attrs.underline = false,
            25 => attrs.blink = false,
            27 => attrs.inverse = false,
            28 => attrs.hidden = false,
            29 => attrs.strikethrough = false,
            n @ 30..=37 => attrs.fg = Color::Indexed((n - 30) as u8),
            38 => {
                if let Some(color) = extended_color(params, &mut i) {
                    attrs.fg = color;
                }
            }
            39 => attrs.fg = Color::Default,
            n @ 40..=47 => attrs.bg = Color::Indexed((n - 40) as u8),
            48 => {
                if let Some(color) = extended_color(params, &mut i) {
                    attrs.bg = color;
                }
            }
            49 => attrs.bg = Color::Default,
            n @ 90..=97 => attrs.fg = Color::Indexed((n - 90 + 8) as u8),
            n @ 100..=107 => attrs.bg = Color::Indexed((n - 100 + 8) as u8),
            other => trace!(sgr = other, "ignored SGR"),
        }
        i += 1;
    }
}

/// Decode a 38/48 color at `params[*i]`, advancing `i` past the
/// semicolon-separated arguments it consumes.
fn extended_color(params: &Params, i: &mut usize) -> Option<Color> {
    let channel = |v: u16| v.min(255) as u8;

    let subs = params.subparams(*i);
    if !subs.is_empty() {
        return match subs {
            [5, index, ..] => Some(Color::Indexed(channel(*index))),
            // 38:2:<colorspace>:R:G:B
            [2, _, r, g, b, ..] => Some(Color::rgb(channel(*r), channel(*g), channel(*b))),
            [2, r, g, b] => Some(Color::rgb(channel(*r), channel(*g), channel(*b))),
            _ => None,
        };
    }

    match params.raw(*i + 1) {
        5 if *i + 2 < params.len() => {
            let index = params.raw(*i + 2);
            *i += 2;
            Some(Color::Indexed(channel(index)))
        }
        2 if *i + 4 < params.len() => {
            let color = Color::rgb(
                channel(params.raw(*i + 2)),
                channel(params.raw(*i + 3)),
                channel(params.raw(*i + 4)),
            );
            *i += 4;
            Some(color)
        }
        _ => {
            // Malformed: skip the rest of the list
            *i = params.len();
            None
        }
    }
}

/// Parse `rgb:R/G/B` (1 to 4 hex digits per channel) or `#RRGGBB`
fn parse_color_spec(spec: &str) -> Option<(u8, u8, u8)> {
    if let Some(body) = spec.strip_prefix("rgb:") {
        let mut channels = body.split('/').map(|part| {
            if part.is_empty() || part.len() > 4 {
                return None;
            }
            let value = u32::from_str_radix(part, 16).ok()?;
            let max = (1u32 << (4 * part.len())) - 1;
            Some((value * 255 / max) as u8)
        });
        let r = channels.next()??;
        let g = channels.next()??;
        let b = channels.next()??;
        return channels.next().is_none().then_some((r, g, b));
    }
    let hex = spec.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let byte = |at: usize| u8::from_str_radix(hex.get(at..at + 2)?, 16).ok();
    Some((byte(0)?, byte(2)?, byte(4)?))
}
