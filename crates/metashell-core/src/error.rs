//! Error types shared by every metashell component.

use thiserror::Error;

/// All errors that can originate from the meta-shell.
#[derive(Debug, Error)]
pub enum MetaShellError {
    /// PTY allocation failed — the OS denied the request.
    #[error("PTY allocation failed: {0}")]
    PtyAllocFailed(String),

    /// Child process spawn failed.
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    /// Putting the controlling terminal into (or out of) raw mode failed.
    #[error("terminal mode error: {0}")]
    TerminalModeFailed(String),

    /// A write to a child's stdin failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A meta-command was malformed (bad or missing argument).
    #[error("usage: {0}")]
    MalformedMetaCommand(String),

    /// Config file could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Referenced a session id that does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MetaShellError>;
