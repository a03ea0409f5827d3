//! Actions produced by the parser
//!
//! These carry the semantic meaning of a parsed sequence; applying them to
//! a screen is the job of [`Terminal`](crate::Terminal).

use super::params::Params;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Print a decoded character at the cursor
    Print(char),
    /// Execute a C0 control: BEL, BS, HT, LF, VT, FF, CR, SO, SI
    Execute(u8),
    Esc(EscAction),
    Csi(CsiAction),
    Osc(OscAction),
}

/// ESC sequences other than CSI/OSC/DCS introducers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscAction {
    /// ESC 7 (DECSC)
    SaveCursor,
    /// ESC 8 (DECRC)
    RestoreCursor,
    /// ESC D (IND)
    Index,
    /// ESC E (NEL)
    NextLine,
    /// ESC M (RI)
    ReverseIndex,
    /// ESC H (HTS)
    HorizontalTabSet,
    /// ESC c (RIS)
    FullReset,
    /// ESC = (DECKPAM)
    ApplicationKeypad,
    /// ESC > (DECKPNM)
    NormalKeypad,
    /// ESC ( ) * + followed by the charset final byte
    DesignateCharset { slot: u8, charset: char },
    /// ESC # 8 (DECALN)
    ScreenAlignment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsiAction {
    pub params: Params,
    /// Intermediate bytes (0x20-0x2F)
    pub intermediates: Vec<u8>,
    /// Final byte (0x40-0x7E)
    pub final_byte: u8,
    /// Leading `?`, `>`, `<` or `=`
    pub marker: Option<u8>,
}

impl CsiAction {
    /// Parameter at index, or `default` when absent or 0
    pub fn param(&self, index: usize, default: u16) -> u16 {
        self.params.get_or(index, default)
    }

    /// DEC private sequence (`CSI ? ...`)
    pub fn is_private(&self) -> bool {
        self.marker == Some(b'?')
    }
}

/// Dynamic colors addressed by OSC 10/11/12
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicColor {
    Foreground,
    Background,
    Cursor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OscAction {
    /// OSC 0
    SetIconAndTitle(String),
    /// OSC 1
    SetIconName(String),
    /// OSC 2
    SetTitle(String),
    /// OSC 7
    SetWorkingDirectory(String),
    /// OSC 8; an empty uri closes the link
    Hyperlink { params: String, uri: String },
    /// OSC 10/11/12 with `?`
    QueryColor(DynamicColor),
    /// OSC 10/11/12 with a color spec
    SetColor(DynamicColor, String),
    /// OSC 104, optionally for one palette index
    ResetPalette(Option<u8>),
    /// OSC 110/111/112
    ResetColor(DynamicColor),
    Unknown { command: Option<u16>, data: String },
}

impl OscAction {
    /// Decode an OSC payload (the bytes between the introducer and terminator)
    pub fn parse(data: &[u8]) -> Self {
        let data = String::from_utf8_lossy(data);
        let (command, payload) = match data.split_once(';') {
            Some((cmd, rest)) => (cmd, rest),
            None => (data.as_ref(), ""),
        };
        let Ok(command) = command.parse::<u16>() else {
            return OscAction::Unknown {
                command: None,
                data: data.into_owned(),
            };
        };
        let payload = payload.to_string();

        match command {
            0 => OscAction::SetIconAndTitle(payload),
            1 => OscAction::SetIconName(payload),
            2 => OscAction::SetTitle(payload),
            7 => OscAction::SetWorkingDirectory(payload),
            8 => match payload.split_once(';') {
                Some((params, uri)) => OscAction::Hyperlink {
                    params: params.to_string(),
                    uri: uri.to_string(),
                },
                None => OscAction::Hyperlink {
                    params: String::new(),
                    uri: payload,
                },
            },
            10 => dynamic_color(DynamicColor::Foreground, payload),
            11 => dynamic_color(DynamicColor::Background, payload),
            12 => dynamic_color(DynamicColor::Cursor, payload),
            104 => OscAction::ResetPalette(payload.parse().ok()),
            110 => OscAction::ResetColor(DynamicColor::Foreground),
            111 => OscAction::ResetColor(DynamicColor::Background),
            112 => OscAction::ResetColor(DynamicColor::Cursor),
            _ => OscAction::Unknown {
                command: Some(command),
                data: payload,
            },
        }
    }
}

fn dynamic_color(kind: DynamicColor, payload: String) -> OscAction {
    if payload == "?" {
        OscAction::QueryColor(kind)
    } else {
        OscAction::SetColor(kind, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csi_action_param() {
        let csi = CsiAction {
            params: Params::from_slice(&[10, 0, 30]),
            intermediates: vec![],
            final_byte: b'H',
            marker: None,
        };
        assert_eq!(csi.param(0, 1), 10);
        assert_eq!(csi.param(1, 1), 1);
        assert_eq!(csi.param(5, 99), 99);
        assert!(!csi.is_private());
    }

    #[test]
    fn test_osc_titles() {
        assert_eq!(
            OscAction::parse(b"0;hello"),
            OscAction::SetIconAndTitle("hello".into())
        );
        assert_eq!(
            OscAction::parse(b"2;a;b"),
            OscAction::SetTitle("a;b".into())
        );
    }

    #[test]
    fn test_osc_hyperlink() {
        assert_eq!(
            OscAction::parse(b"8;id=1;https://example.com"),
            OscAction::Hyperlink {
                params: "id=1".into(),
                uri: "https://example.com".into()
            }
        );
        assert_eq!(
            OscAction::parse(b"8;;"),
            OscAction::Hyperlink {
                params: String::new(),
                uri: String::new()
            }
        );
    }

    #[test]
    fn test_osc_color_query() {
        assert_eq!(
            OscAction::parse(b"11;?"),
            OscAction::QueryColor(DynamicColor::Background)
        );
        assert_eq!(
            OscAction::parse(b"10;#ffffff"),
            OscAction::SetColor(DynamicColor::Foreground, "#ffffff".into())
        );
        assert_eq!(OscAction::parse(b"104"), OscAction::ResetPalette(None));
    }

    #[test]
    fn test_osc_unknown() {
        assert!(matches!(
            OscAction::parse(b"x;y"),
            OscAction::Unknown { command: None, .. }
        ));
        assert!(matches!(
            OscAction::parse(b"777;z"),
            OscAction::Unknown {
                command: Some(777),
                ..
            }
        ));
    }
}
