//! vtcore: a terminal emulation core
//!
//! Interprets the byte stream of a child shell, maintains a VT/xterm screen
//! model and a searchable scrollback history, and exposes both to a
//! presentation layer. Rendering, windowing and input capture live elsewhere;
//! they talk to this crate through [`Engine`].
//!
//! - `core`: Screen model, cells, cursor, scrollback buffer, snapshots
//! - `parser`: VT500-series escape sequence parser
//! - `terminal`: applies parsed actions to the screen
//! - `pty`: Unix PTY management
//! - `search`: literal and regex search over history, URL detection
//! - `input`: key event encoding
//! - `engine`: reader/writer workers around one PTY and one screen

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod input;
pub mod parser;
pub mod pty;
pub mod search;
pub mod terminal;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use input::{KeyAction, KeyCode, KeyEvent, Modifiers};
pub use search::{
    HistoryView, SearchEngine, SearchError, SearchMatch, TextSource, UrlDetector, UrlKind, UrlMatch,
};
pub use terminal::Terminal;
