//! Library error taxonomy.

use std::path::PathBuf;

use crate::engine::EngineError;

/// Failures surfaced by the client wrappers.
///
/// Transport failures carry the engine's error descriptor; argument and
/// resource failures are raised before any transfer is attempted and are
/// therefore always distinguishable from a failed transfer.
#[derive(Debug)]
pub enum Error {
    /// The transfer session was closed; call `init()` before further use.
    SessionClosed,
    /// An argument precondition was violated; no transfer was attempted.
    InvalidInput(String),
    /// A local file could not be opened or resolved.
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The engine reported a failed transfer.
    Transport(EngineError),
    /// A response body could not be deserialized.
    Decode(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SessionClosed => {
                write!(f, "transfer session is closed; call init() before use")
            }
            Error::InvalidInput(msg) => {
                write!(f, "invalid argument: {msg}")
            }
            Error::File { path, source } => {
                write!(f, "failed to open {}: {source}", path.display())
            }
            Error::Transport(error) => {
                write!(f, "{error}")
            }
            Error::Decode(error) => {
                write!(f, "failed to decode response body: {error}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::File { source, .. } => Some(source),
            Error::Transport(error) => Some(error),
            Error::Decode(error) => Some(error),
            _ => None,
        }
    }
}
