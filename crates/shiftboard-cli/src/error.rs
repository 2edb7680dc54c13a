//! Client error types.

use std::fmt;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// One or more sources could not be fetched.
    Source(String),
    /// Parsing, normalization, merging or rendering failed.
    Core(shiftboard_core::CoreError),
    /// IO error.
    Io(std::io::Error),
    /// The run finished with warnings and `--strict` was given.
    Strict(usize),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Source(msg) => write!(f, "source error: {}", msg),
            Self::Core(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Strict(count) => write!(f, "{} warning(s) reported in strict mode", count),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<shiftboard_core::CoreError> for ClientError {
    fn from(err: shiftboard_core::CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<shiftboard_sources::SourceError> for ClientError {
    fn from(err: shiftboard_sources::SourceError) -> Self {
        Self::Source(err.to_string())
    }
}
