//! Streaming UTF-8 decoding for the terminal parser
//!
//! Bytes arrive in arbitrary chunks, so the decoder carries a partial
//! codepoint between calls. Overlong encodings, surrogates and values past
//! U+10FFFF are rejected.

/// Result of feeding a byte to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Step {
    /// Need more bytes
    Pending,
    Char(char),
    /// Malformed input; the caller substitutes U+FFFD
    Invalid,
}

#[derive(Debug, Clone, Default)]
pub struct Utf8Decoder {
    codepoint: u32,
    /// Continuation bytes still expected
    remaining: u8,
    /// Smallest codepoint the current sequence length may encode
    min: u32,
}

pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.codepoint = 0;
        self.remaining = 0;
        self.min = 0;
    }

    /// In the middle of a multi-byte sequence
    pub fn is_pending(&self) -> bool {
        self.remaining > 0
    }

    pub fn feed(&mut self, byte: u8) -> Utf8Step {
        if self.remaining == 0 {
            return match byte {
                0x00..=0x7F => Utf8Step::Char(byte as char),
                0xC2..=0xDF => self.start(1, byte & 0x1F, 0x80),
                0xE0..=0xEF => self.start(2, byte & 0x0F, 0x800),
                0xF0..=0xF4 => self.start(3, byte & 0x07, 0x1_0000),
                // Stray continuation, C0/C1 overlong leads, F5..FF
                _ => Utf8Step::Invalid,
            };
        }

        if !is_continuation(byte) {
            self.reset();
            return Utf8Step::Invalid;
        }

        self.codepoint = (self.codepoint << 6) | u32::from(byte & 0x3F);
        self.remaining -= 1;
        if self.remaining > 0 {
            return Utf8Step::Pending;
        }

        let (cp, min) = (self.codepoint, self.min);
        self.reset();
        if cp < min {
            return Utf8Step::Invalid;
        }
        char::from_u32(cp).map_or(Utf8Step::Invalid, Utf8Step::Char)
    }

    fn start(&mut self, remaining: u8, bits: u8, min: u32) -> Utf8Step {
        self.codepoint = u32::from(bits);
        self.remaining = remaining;
        self.min = min;
        Utf8Step::Pending
    }
}

pub fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}
