//! Input Encoding Module
//!
//! Translates key events from the input collaborator into the byte sequences
//! terminal applications expect.
//!
//! # Keyboard Encoding
//!
//! Different keys produce different sequences depending on:
//! - Application cursor mode (DECCKM)
//! - Application keypad mode (DECKPAM/DECKPNM)
//! - Modifier keys (Shift, Ctrl, Alt)

use serde::{Deserialize, Serialize};

use crate::core::Modes;

/// Keyboard modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
    };
    pub const ALT: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: true,
    };

    /// Get the modifier parameter for CSI sequences (1 + bitmask)
    /// Shift=1, Alt=2, Ctrl=4
    pub fn as_csi_param(&self) -> u8 {
        let mut param = 1;
        if self.shift {
            param += 1;
        }
        if self.alt {
            param += 2;
        }
        if self.ctrl {
            param += 4;
        }
        param
    }

    /// Check if any modifier is pressed
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt
    }
}

/// Keys the core knows how to encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCode {
    /// A printable character
    Char(char),

    // Cursor keys
    Up,
    Down,
    Left,
    Right,

    // Navigation
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,

    /// F1 through F12
    F(u8),

    // Editing
    Backspace,
    Tab,
    Enter,
    Escape,

    // Keypad
    KeypadEnter,
    KeypadPlus,
    KeypadMinus,
    KeypadMultiply,
    KeypadDivide,
    KeypadDecimal,
    /// Keypad digit 0-9
    Keypad(u8),
}

/// What happened to the key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAction {
    #[default]
    Press,
    Repeat,
    Release,
}

/// A key event as the input collaborator reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn new(code: KeyCode, modifiers: Modifiers, action: KeyAction) -> Self {
        Self {
            code,
            modifiers,
            action,
        }
    }

    /// A plain key press
    pub fn press(code: KeyCode) -> Self {
        Self::new(code, Modifiers::NONE, KeyAction::Press)
    }
}

/// Encode a key event for the given terminal modes.
///
/// Releases produce no bytes; repeats encode like presses.
pub fn encode_key(event: &KeyEvent, modes: &Modes) -> Vec<u8> {
    if event.action == KeyAction::Release {
        return Vec::new();
    }
    let modifiers = event.modifiers;
    let application_keypad = modes.application_keypad;

    match event.code {
        KeyCode::Char(c) => encode_char(c, modifiers),

        // Cursor keys
        KeyCode::Up => encode_cursor_key(b'A', modifiers, modes.application_cursor),
        KeyCode::Down => encode_cursor_key(b'B', modifiers, modes.application_cursor),
        KeyCode::Right => encode_cursor_key(b'C', modifiers, modes.application_cursor),
        KeyCode::Left => encode_cursor_key(b'D', modifiers, modes.application_cursor),

        // Home and End follow DECCKM like the arrows
        KeyCode::Home => encode_cursor_key(b'H', modifiers, modes.application_cursor),
        KeyCode::End => encode_cursor_key(b'F', modifiers, modes.application_cursor),
        KeyCode::Insert => encode_special_key(2, modifiers),
        KeyCode::Delete => encode_special_key(3, modifiers),
        KeyCode::PageUp => encode_special_key(5, modifiers),
        KeyCode::PageDown => encode_special_key(6, modifiers),

        KeyCode::F(n) => encode_function_key(n, modifiers),

        // Editing keys
        KeyCode::Backspace => {
            if modifiers.ctrl {
                vec![0x08] // Ctrl+Backspace = BS
            } else if modifiers.alt {
                vec![0x1b, 0x7f] // Alt+Backspace = ESC DEL
            } else {
                vec![0x7f] // DEL
            }
        }
        KeyCode::Tab => {
            if modifiers.shift {
                vec![0x1b, b'[', b'Z'] // Shift+Tab = CSI Z (backtab)
            } else {
                vec![0x09] // HT
            }
        }
        KeyCode::Enter => {
            let newline: &[u8] = if modes.linefeed_mode { b"\r\n" } else { b"\r" };
            with_alt(newline, modifiers.alt)
        }
        KeyCode::Escape => with_alt(&[0x1b], modifiers.alt),

        // Keypad keys
        KeyCode::KeypadEnter => encode_keypad(b'M', b"\r", application_keypad),
        KeyCode::KeypadPlus => encode_keypad(b'k', b"+", application_keypad),
        KeyCode::KeypadMinus => encode_keypad(b'm', b"-", application_keypad),
        KeyCode::KeypadMultiply => encode_keypad(b'j', b"*", application_keypad),
        KeyCode::KeypadDivide => encode_keypad(b'o', b"/", application_keypad),
        KeyCode::KeypadDecimal => encode_keypad(b'n', b".", application_keypad),
        KeyCode::Keypad(digit) if digit <= 9 => {
            encode_keypad(b'p' + digit, &[b'0' + digit], application_keypad)
        }
        KeyCode::Keypad(_) => Vec::new(),
    }
}

fn with_alt(bytes: &[u8], alt: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    if alt {
        out.push(0x1b);
    }
    out.extend_from_slice(bytes);
    out
}

/// Encode a cursor key (arrow keys, Home, End)
fn encode_cursor_key(code: u8, modifiers: Modifiers, application_mode: bool) -> Vec<u8> {
    if modifiers.any() {
        // With modifiers: CSI 1 ; modifier code
        let param = modifiers.as_csi_param();
        format!("\x1b[1;{}{}", param, code as char).into_bytes()
    } else if application_mode {
        // Application mode: SS3 code
        vec![0x1b, b'O', code]
    } else {
        // Normal mode: CSI code
        vec![0x1b, b'[', code]
    }
}

/// Encode a `CSI n ~` key (Insert, Delete, PgUp, PgDn, F5-F12)
fn encode_special_key(number: u8, modifiers: Modifiers) -> Vec<u8> {
    if modifiers.any() {
        let param = modifiers.as_csi_param();
        format!("\x1b[{};{}~", number, param).into_bytes()
    } else {
        format!("\x1b[{}~", number).into_bytes()
    }
}

/// Encode function keys; F1-F4 use SS3, the rest `CSI n ~`
fn encode_function_key(number: u8, modifiers: Modifiers) -> Vec<u8> {
    let code = match number {
        1 => b'P',
        2 => b'Q',
        3 => b'R',
        4 => b'S',
        5 => return encode_special_key(15, modifiers),
        6..=10 => return encode_special_key(number + 11, modifiers),
        11 | 12 => return encode_special_key(number + 12, modifiers),
        _ => return Vec::new(),
    };

    if modifiers.any() {
        let param = modifiers.as_csi_param();
        format!("\x1b[1;{}{}", param, code as char).into_bytes()
    } else {
        vec![0x1b, b'O', code]
    }
}

/// Encode a keypad key: SS3 in application mode, the plain character otherwise
fn encode_keypad(app_code: u8, normal: &[u8], application_mode: bool) -> Vec<u8> {
    if application_mode {
        vec![0x1b, b'O', app_code]
    } else {
        normal.to_vec()
    }
}

/// Encode a character with modifiers
pub fn encode_char(c: char, modifiers: Modifiers) -> Vec<u8> {
    let control = if modifiers.ctrl { control_byte(c) } else { None };
    if let Some(byte) = control {
        with_alt(&[byte], modifiers.alt)
    } else {
        let mut buf = [0u8; 4];
        with_alt(c.encode_utf8(&mut buf).as_bytes(), modifiers.alt)
    }
}

/// Control byte for Ctrl+`c`, if there is one
fn control_byte(c: char) -> Option<u8> {
    match c {
        'a'..='z' | 'A'..='Z' => Some(c.to_ascii_uppercase() as u8 - b'@'),
        '@' | ' ' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' | '/' => Some(0x1f),
        '8' | '?' => Some(0x7f),
        _ => None,
    }
}

/// Wrap pasted text in bracketed-paste markers when the mode is on.
///
/// Embedded end markers are stripped so a paste cannot terminate itself early.
pub fn encode_paste(text: &str, bracketed: bool) -> Vec<u8> {
    if !bracketed {
        return text.as_bytes().to_vec();
    }
    let body = text.replace("\x1b[201~", "");
    let mut out = Vec::with_capacity(body.len() + 12);
    out.extend_from_slice(b"\x1b[200~");
    out.extend_from_slice(body.as_bytes());
    out.extend_from_slice(b"\x1b[201~");
    out
}

/// Encode focus in/out events
pub fn encode_focus(focused: bool) -> &'static [u8] {
    if focused {
        b"\x1b[I"
    } else {
        b"\x1b[O"
    }
}
