//! PTY (Pseudoterminal) handling
//!
//! This module provides functionality for creating and managing pseudoterminals,
//! spawning child processes, and handling I/O.

use std::path::PathBuf;

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{Pty, PtyCommand};

/// Error type for PTY operations
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("failed to open PTY master: {0}")]
    OpenMaster(#[source] nix::Error),

    #[error("failed to grant PTY access: {0}")]
    GrantPty(#[source] nix::Error),

    #[error("failed to unlock PTY: {0}")]
    UnlockPty(#[source] nix::Error),

    #[error("failed to get PTY slave name: {0}")]
    PtsName(#[source] nix::Error),

    #[error("failed to fork: {0}")]
    Fork(#[source] nix::Error),

    #[error("failed to set window size: {0}")]
    SetWinsize(#[source] nix::Error),

    #[error("failed to configure PTY master: {0}")]
    SetNonBlocking(#[source] nix::Error),

    #[error("shell not found or not executable: {0}")]
    ShellNotFound(PathBuf),

    #[error("working directory is not a directory: {0}")]
    InvalidWorkingDir(PathBuf),

    #[error("invalid spawn argument: {0}")]
    InvalidArgument(String),

    #[error("failed to read from PTY: {0}")]
    Read(#[source] nix::Error),

    #[error("failed to write to PTY: {0}")]
    Write(#[source] nix::Error),

    #[error("failed to poll: {0}")]
    Poll(#[source] nix::Error),

    #[error("failed to signal child: {0}")]
    Signal(#[source] nix::Error),

    /// The child exited and the slave side is gone
    #[error("end of file: child process exited")]
    Eof,

    #[error("PTY channel is closed")]
    Closed,
}

impl PtyError {
    /// Whether the error happened while launching the child
    pub fn is_spawn_error(&self) -> bool {
        matches!(
            self,
            PtyError::OpenMaster(_)
                | PtyError::GrantPty(_)
                | PtyError::UnlockPty(_)
                | PtyError::PtsName(_)
                | PtyError::Fork(_)
                | PtyError::SetWinsize(_)
                | PtyError::SetNonBlocking(_)
                | PtyError::ShellNotFound(_)
                | PtyError::InvalidWorkingDir(_)
                | PtyError::InvalidArgument(_)
        )
    }
}

/// Result type for PTY operations
pub type PtyResult<T> = Result<T, PtyError>;

/// Window size for PTY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
    pub pixel_width: u16,
    pub pixel_height: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }

    /// Grid dimensions, saturating at `u16::MAX`
    pub fn from_grid(cols: usize, rows: usize) -> Self {
        let clamp = |v: usize| u16::try_from(v).unwrap_or(u16::MAX);
        Self::new(clamp(cols), clamp(rows))
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

/// Result of a non-blocking read that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were placed in the buffer
    Data(usize),
    /// Nothing available right now
    WouldBlock,
}

/// How the child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
    /// Reaped elsewhere; the status is lost
    Unknown,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}
