//! Parser State Machine
//!
//! Implements a VT500-series compatible parser state machine.
//! The parser handles arbitrary chunk boundaries and produces
//! semantic actions for the terminal core.
//!
//! The parser follows the state machine model described in
//! "A parser for DEC's ANSI-compatible video terminals" by Paul Williams
//! (<https://vt100.net/emu/dec_ansi_parser>). UTF-8 decoding is layered on
//! top of the Ground state only; every other state classifies raw bytes.
//!
//! Malformed input never fails: the offending sequence is dropped, logged at
//! `trace` level, and the parser returns to Ground.

use tracing::trace;

use super::action::{Action, CsiAction, EscAction, OscAction};
use super::params::Params;
use super::utf8::{is_continuation, Utf8Decoder, Utf8Step, REPLACEMENT_CHAR};

/// Maximum OSC payload; excess bytes are dropped
pub const MAX_OSC_LEN: usize = 64 * 1024;
/// Maximum number of intermediate bytes in an ESC or CSI sequence
const MAX_INTERMEDIATES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    Ground,
    /// After ESC
    Escape,
    /// ESC followed by intermediate bytes (`ESC ( B`, `ESC # 8`)
    EscapeIntermediate,
    /// After CSI, before any parameter byte
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    /// Malformed CSI, consumed until its final byte
    CsiIgnore,
    OscString,
    DcsEntry,
    DcsParam,
    /// DCS payload, consumed and dropped
    DcsPassthrough,
    DcsIgnore,
    /// SOS, PM and APC payloads, consumed and dropped
    SosPmApcString,
}

/// The terminal parser
#[derive(Debug, Clone, Default)]
pub struct Parser {
    state: ParserState,
    utf8: Utf8Decoder,
    params: Params,
    intermediates: Vec<u8>,
    marker: Option<u8>,
    osc: Vec<u8>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Back to Ground, discarding any partial sequence
    pub fn reset(&mut self) {
        self.state = ParserState::Ground;
        self.utf8.reset();
        self.params.clear();
        self.intermediates.clear();
        self.marker = None;
        self.osc.clear();
    }

    /// Parse a chunk of bytes, calling the callback for each action.
    ///
    /// State carries over between calls, so a sequence may be split at any
    /// byte boundary.
    pub fn parse<F>(&mut self, data: &[u8], mut callback: F)
    where
        F: FnMut(Action),
    {
        for &byte in data {
            self.advance(byte, &mut callback);
        }
    }

    /// Parse a chunk and collect actions into a vector
    pub fn parse_collect(&mut self, data: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        self.parse(data, |action| actions.push(action));
        actions
    }

    fn advance<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        if self.utf8.is_pending() {
            if is_continuation(byte) {
                self.feed_utf8(byte, callback);
                return;
            }
            // Interrupted sequence; the byte itself is processed normally
            self.utf8.reset();
            callback(Action::Print(REPLACEMENT_CHAR));
        }

        // CAN, SUB and ESC act from every state
        match byte {
            0x18 | 0x1A => {
                if self.state != ParserState::Ground {
                    trace!(state = ?self.state, "sequence cancelled");
                }
                self.state = ParserState::Ground;
                return;
            }
            0x1B => {
                self.terminate_string(callback);
                self.enter_escape();
                return;
            }
            _ => {}
        }

        match self.state {
            ParserState::OscString => {
                self.handle_osc_string(byte, callback);
                return;
            }
            // Payload is dropped until the string terminator
            ParserState::DcsPassthrough | ParserState::DcsIgnore | ParserState::SosPmApcString => {
                return;
            }
            _ => {}
        }

        if byte < 0x20 {
            if !matches!(self.state, ParserState::DcsEntry | ParserState::DcsParam)
                && (0x07..=0x0F).contains(&byte)
            {
                callback(Action::Execute(byte));
            }
            return;
        }

        if byte == 0x7F {
            return;
        }

        // The stream is UTF-8, so a lone 0x80..0x9F is malformed text rather
        // than an 8-bit control
        if (0x80..=0x9F).contains(&byte) {
            if self.state != ParserState::Ground {
                trace!(state = ?self.state, byte, "stray high byte aborted sequence");
                self.state = ParserState::Ground;
            }
            self.feed_utf8(byte, callback);
            return;
        }

        match self.state {
            ParserState::Ground => self.handle_ground(byte, callback),
            ParserState::Escape => self.handle_escape(byte, callback),
            ParserState::EscapeIntermediate => self.handle_escape_intermediate(byte, callback),
            ParserState::CsiEntry => self.handle_csi_entry(byte, callback),
            ParserState::CsiParam => self.handle_csi_param(byte, callback),
            ParserState::CsiIntermediate => self.handle_csi_intermediate(byte, callback),
            ParserState::CsiIgnore => {
                if (0x40..=0x7E).contains(&byte) {
                    trace!(final_byte = byte, "dropped malformed CSI");
                    self.state = ParserState::Ground;
                }
            }
            ParserState::DcsEntry | ParserState::DcsParam => self.handle_dcs_header(byte),
            ParserState::OscString
            | ParserState::DcsPassthrough
            | ParserState::DcsIgnore
            | ParserState::SosPmApcString => {}
        }
    }

    fn feed_utf8<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match self.utf8.feed(byte) {
            Utf8Step::Char(c) => callback(Action::Print(c)),
            Utf8Step::Invalid => callback(Action::Print(REPLACEMENT_CHAR)),
            Utf8Step::Pending => {}
        }
    }

    fn handle_ground<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        if byte < 0x7F {
            callback(Action::Print(byte as char));
        } else {
            self.feed_utf8(byte, callback);
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.intermediates.clear();
    }

    fn esc_dispatch<F>(&mut self, action: EscAction, callback: &mut F)
    where
        F: FnMut(Action),
    {
        callback(Action::Esc(action));
        self.state = ParserState::Ground;
    }

    fn handle_escape<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            b'[' => self.enter_csi(),
            b']' => self.enter_osc(),
            b'P' => self.enter_dcs(),
            b'X' | b'^' | b'_' => self.state = ParserState::SosPmApcString,
            // ST outside a string
            b'\\' => self.state = ParserState::Ground,
            b'7' => self.esc_dispatch(EscAction::SaveCursor, callback),
            b'8' => self.esc_dispatch(EscAction::RestoreCursor, callback),
            b'D' => self.esc_dispatch(EscAction::Index, callback),
            b'E' => self.esc_dispatch(EscAction::NextLine, callback),
            b'M' => self.esc_dispatch(EscAction::ReverseIndex, callback),
            b'H' => self.esc_dispatch(EscAction::HorizontalTabSet, callback),
            b'c' => self.esc_dispatch(EscAction::FullReset, callback),
            b'=' => self.esc_dispatch(EscAction::ApplicationKeypad, callback),
            b'>' => self.esc_dispatch(EscAction::NormalKeypad, callback),
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            _ => {
                trace!(final_byte = byte, "ignored ESC sequence");
                self.state = ParserState::Ground;
            }
        }
    }

    fn handle_escape_intermediate<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            0x20..=0x2F => {
                if self.intermediates.len() < MAX_INTERMEDIATES {
                    self.intermediates.push(byte);
                }
            }
            0x30..=0x7E => {
                let action = match (self.intermediates.as_slice(), byte) {
                    ([b'#'], b'8') => Some(EscAction::ScreenAlignment),
                    ([slot @ (b'(' | b')' | b'*' | b'+')], charset) => {
                        Some(EscAction::DesignateCharset {
                            slot: match slot {
                                b'(' => 0,
                                b')' => 1,
                                b'*' => 2,
                                _ => 3,
                            },
                            charset: charset as char,
                        })
                    }
                    _ => None,
                };
                match action {
                    Some(action) => self.esc_dispatch(action, callback),
                    None => {
                        trace!(intermediates = ?self.intermediates, final_byte = byte, "ignored ESC sequence");
                        self.state = ParserState::Ground;
                    }
                }
            }
            _ => self.state = ParserState::Ground,
        }
    }

    fn enter_csi(&mut self) {
        self.state = ParserState::CsiEntry;
        self.params.clear();
        self.intermediates.clear();
        self.marker = None;
    }

    fn handle_csi_entry<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            b'<' | b'=' | b'>' | b'?' => {
                self.marker = Some(byte);
                self.state = ParserState::CsiParam;
            }
            _ => self.handle_csi_param(byte, callback),
        }
    }

    fn handle_csi_param<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            b'0'..=b'9' | b';' | b':' => {
                self.params.push_byte(byte);
                self.state = ParserState::CsiParam;
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => self.dispatch_csi(byte, callback),
            // Marker out of place, or a non-ASCII byte
            _ => self.state = ParserState::CsiIgnore,
        }
    }

    fn handle_csi_intermediate<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            0x20..=0x2F if self.intermediates.len() < MAX_INTERMEDIATES => {
                self.intermediates.push(byte);
            }
            0x40..=0x7E => self.dispatch_csi(byte, callback),
            _ => self.state = ParserState::CsiIgnore,
        }
    }

    fn dispatch_csi<F>(&mut self, final_byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        self.params.finish();
        let action = CsiAction {
            params: std::mem::take(&mut self.params),
            intermediates: std::mem::take(&mut self.intermediates),
            final_byte,
            marker: self.marker.take(),
        };
        self.state = ParserState::Ground;
        callback(Action::Csi(action));
    }

    fn enter_osc(&mut self) {
        self.state = ParserState::OscString;
        self.osc.clear();
    }

    fn handle_osc_string<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            // BEL terminates OSC (xterm extension)
            0x07 => {
                self.terminate_string(callback);
                self.state = ParserState::Ground;
            }
            0x00..=0x1F => {}
            _ => {
                if self.osc.len() < MAX_OSC_LEN {
                    self.osc.push(byte);
                }
            }
        }
    }

    fn enter_dcs(&mut self) {
        self.state = ParserState::DcsEntry;
        self.params.clear();
        self.intermediates.clear();
    }

    fn handle_dcs_header(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' | b';' | b':' => self.state = ParserState::DcsParam,
            b'<'..=b'?' if self.state == ParserState::DcsEntry => {
                self.state = ParserState::DcsParam
            }
            0x20..=0x2F => {}
            0x40..=0x7E => self.state = ParserState::DcsPassthrough,
            _ => self.state = ParserState::DcsIgnore,
        }
    }

    /// Finish a string state. OSC payloads are dispatched; the rest are dropped.
    fn terminate_string<F>(&mut self, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match self.state {
            ParserState::OscString => {
                let action = OscAction::parse(&self.osc);
                self.osc.clear();
                callback(Action::Osc(action));
            }
            ParserState::DcsPassthrough | ParserState::DcsIgnore | ParserState::SosPmApcString => {
                trace!(state = ?self.state, "dropped control string");
            }
            _ => {}
        }
    }
}
