//! Crate-level error type returned by the engine

use crate::core::ScrollbackError;
use crate::pty::PtyError;
use crate::search::SearchError;

/// Errors surfaced to the owner of an [`Engine`](crate::Engine)
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The child process could not be started
    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] PtyError),

    #[error("PTY I/O error: {0}")]
    Io(#[source] PtyError),

    /// The shell exited or the engine was closed
    #[error("channel closed: shell has exited")]
    ChannelClosed,

    /// The write queue is full
    #[error("write queue full ({capacity} pending chunks)")]
    Backpressure { capacity: usize },

    #[error(transparent)]
    Scrollback(#[from] ScrollbackError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("worker thread error: {0}")]
    Worker(String),
}

impl From<PtyError> for Error {
    fn from(err: PtyError) -> Self {
        match err {
            PtyError::Eof | PtyError::Closed => Error::ChannelClosed,
            err if err.is_spawn_error() => Error::Spawn(err),
            err => Error::Io(err),
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_error_classification() {
        assert!(matches!(
            Error::from(PtyError::ShellNotFound("/nope".into())),
            Error::Spawn(_)
        ));
        assert!(matches!(Error::from(PtyError::Eof), Error::ChannelClosed));
        assert!(matches!(Error::from(PtyError::Closed), Error::ChannelClosed));
        assert!(matches!(
            Error::from(PtyError::Read(nix::Error::EBADF)),
            Error::Io(_)
        ));
    }

    #[test]
    fn test_display() {
        let err = Error::Backpressure { capacity: 8 };
        assert_eq!(err.to_string(), "write queue full (8 pending chunks)");
    }
}
