//! G0-G3 character set designation and DEC Special Graphics translation

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Charset {
    #[default]
    Ascii,
    /// Line drawing (`ESC ( 0`)
    DecSpecialGraphics,
    /// `ESC ( A`: `#` becomes `£`
    Uk,
}

impl Charset {
    /// Charset named by the final byte of a designation sequence
    pub fn from_designator(final_char: char) -> Option<Self> {
        match final_char {
            'B' => Some(Charset::Ascii),
            '0' => Some(Charset::DecSpecialGraphics),
            'A' => Some(Charset::Uk),
            _ => None,
        }
    }

    pub fn translate(self, c: char) -> char {
        match self {
            Charset::Ascii => c,
            Charset::Uk if c == '#' => '£',
            Charset::Uk => c,
            Charset::DecSpecialGraphics => dec_special_graphics(c),
        }
    }
}

/// Four designatable slots plus the shift state selecting one into GL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharsetState {
    slots: [Charset; 4],
    /// 0 after SI, 1 after SO
    active: usize,
}

impl CharsetState {
    pub fn designate(&mut self, slot: usize, charset: Charset) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = charset;
        }
    }

    /// SO
    pub fn shift_out(&mut self) {
        self.active = 1;
    }

    /// SI
    pub fn shift_in(&mut self) {
        self.active = 0;
    }

    pub fn translate(&self, c: char) -> char {
        if c.is_ascii() {
            self.slots[self.active].translate(c)
        } else {
            c
        }
    }
}

fn dec_special_graphics(c: char) -> char {
    match c {
        '`' => '◆',
        'a' => '▒',
        'f' => '°',
        'g' => '±',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_drawing_after_designation() {
        let mut state = CharsetState::default();
        assert_eq!(state.translate('q'), 'q');
        state.designate(0, Charset::DecSpecialGraphics);
        assert_eq!(state.translate('q'), '─');
        assert_eq!(state.translate('A'), 'A');
    }

    #[test]
    fn test_shift_out_selects_g1() {
        let mut state = CharsetState::default();
        state.designate(1, Charset::DecSpecialGraphics);
        assert_eq!(state.translate('x'), 'x');
        state.shift_out();
        assert_eq!(state.translate('x'), '│');
        state.shift_in();
        assert_eq!(state.translate('x'), 'x');
    }
}
