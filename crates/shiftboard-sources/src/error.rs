//! Error types for schedule source operations.
//!
//! This module defines the transport errors that can occur while fetching a
//! raw schedule document from a file or an HTTP endpoint.

use std::fmt;
use thiserror::Error;

/// The category of a source error.
///
/// This enum provides a high-level classification of errors for use in
/// reporting and retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorCode {
    /// The session was rejected or the CSRF token was refused.
    AuthenticationFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Rate limit exceeded - too many requests.
    RateLimited,
    /// Server returned an error (5xx status codes).
    ServerError,
    /// Invalid response from the server - unexpected status or unreadable body.
    InvalidResponse,
    /// Document or page not found (404 or missing file).
    NotFound,
    /// Configuration error - missing or invalid source settings.
    ConfigurationError,
    /// Local I/O error other than a missing file.
    IoError,
}

impl SourceErrorCode {
    /// Returns true if this error is transient and the fetch may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    /// Returns a human-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::ConfigurationError => "configuration_error",
            Self::IoError => "io_error",
        }
    }
}

impl fmt::Display for SourceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while fetching a schedule document.
#[derive(Debug, Error)]
pub struct SourceError {
    code: SourceErrorCode,
    message: String,
    /// Name of the source that failed, when known.
    origin: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SourceError {
    /// Creates a new source error with the given code and message.
    pub fn new(code: SourceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            origin: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(SourceErrorCode::AuthenticationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SourceErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(SourceErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(SourceErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorCode::NotFound, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(SourceErrorCode::ConfigurationError, message)
    }

    /// Maps an I/O error, treating a missing file as [`SourceErrorCode::NotFound`].
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => SourceErrorCode::NotFound,
            _ => SourceErrorCode::IoError,
        };
        Self::new(code, message).with_source(err)
    }

    /// Sets the name of the failing source.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> SourceErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref origin) = self.origin {
            write!(f, "[{}] ", origin)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_retryable() {
        assert!(SourceErrorCode::NetworkError.is_retryable());
        assert!(SourceErrorCode::RateLimited.is_retryable());
        assert!(SourceErrorCode::ServerError.is_retryable());
        assert!(!SourceErrorCode::AuthenticationFailed.is_retryable());
        assert!(!SourceErrorCode::NotFound.is_retryable());
        assert!(!SourceErrorCode::IoError.is_retryable());
    }

    #[test]
    fn io_errors_map_missing_files_to_not_found() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(
            SourceError::io("read failed", missing).code(),
            SourceErrorCode::NotFound
        );

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let err = SourceError::io("read failed", denied);
        assert_eq!(err.code(), SourceErrorCode::IoError);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn source_error_display() {
        let err = SourceError::rate_limited("too many requests").with_origin("clinic");
        let display = format!("{}", err);
        assert!(display.contains("[clinic]"));
        assert!(display.contains("rate_limited"));
        assert!(display.contains("too many requests"));
        assert_eq!(err.origin(), Some("clinic"));
        assert!(err.is_retryable());
    }
}
