//! ScheduleSource trait definition.
//!
//! This module defines the [`ScheduleSource`] trait, the abstraction for
//! anything that yields a raw schedule document: a local export, an HTTP
//! schedule page, a JSON slot feed.
//!
//! Sources only move bytes. They never parse the document; the caller picks
//! a `DocumentParser` from the source configuration or from
//! [`FetchedDocument::suggested_parser`].

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::error::{SourceError, SourceErrorCode, SourceResult};

/// A raw document as returned by a source.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Name of the source that produced the document.
    pub source: String,
    /// Document text, decoded as UTF-8.
    pub body: String,
    /// MIME type reported by the transport, if any.
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedDocument {
    pub fn new(source: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            body: body.into(),
            content_type: None,
            fetched_at: Utc::now(),
        }
    }

    /// Builder method to set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns true when the transport says JSON, or the body looks like it.
    pub fn looks_like_json(&self) -> bool {
        if let Some(ct) = &self.content_type {
            return ct.to_lowercase().contains("json");
        }
        matches!(self.body.trim_start().chars().next(), Some('{' | '['))
    }

    /// Parser identifier to use when the source configuration names none.
    pub fn suggested_parser(&self) -> &'static str {
        if self.looks_like_json() { "slots" } else { "table" }
    }
}

/// A boxed future for async trait methods.
///
/// Using boxed futures keeps the trait object-safe so sources of different
/// kinds can live in one `Vec<Box<dyn ScheduleSource>>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core abstraction for schedule sources.
///
/// # Example Implementation
///
/// ```ignore
/// struct FtpSource { client: FtpClient, path: String }
///
/// impl ScheduleSource for FtpSource {
///     fn name(&self) -> &str { "ftp" }
///     fn location(&self) -> String { self.path.clone() }
///
///     fn fetch(&self) -> BoxFuture<'_, SourceResult<FetchedDocument>> {
///         Box::pin(async move {
///             let body = self.client.retrieve(&self.path).await?;
///             Ok(FetchedDocument::new(self.name(), body))
///         })
///     }
/// }
/// ```
pub trait ScheduleSource: Send + Sync {
    /// Returns the configured name of this source.
    fn name(&self) -> &str;

    /// Human-readable location of the document (path or URL) for logs.
    fn location(&self) -> String;

    /// Fetches the raw document.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` on network errors, rejected sessions, missing
    /// files, etc.
    fn fetch(&self) -> BoxFuture<'_, SourceResult<FetchedDocument>>;
}

/// A source serving a document held in memory.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    body: String,
    content_type: Option<String>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl ScheduleSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }

    fn fetch(&self) -> BoxFuture<'_, SourceResult<FetchedDocument>> {
        let mut doc = FetchedDocument::new(&self.name, &self.body);
        doc.content_type = self.content_type.clone();
        Box::pin(async move { Ok(doc) })
    }
}

/// A source that always fails.
///
/// This stands in for a source whose configuration could not be turned into
/// a working source, so the failure is reported alongside the others.
#[derive(Debug, Clone)]
pub struct ErrorSource {
    name: String,
    code: SourceErrorCode,
    message: String,
}

impl ErrorSource {
    pub fn new(name: impl Into<String>, error: &SourceError) -> Self {
        Self {
            name: name.into(),
            code: error.code(),
            message: error.message().to_string(),
        }
    }
}

impl ScheduleSource for ErrorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> String {
        "<unavailable>".to_string()
    }

    fn fetch(&self) -> BoxFuture<'_, SourceResult<FetchedDocument>> {
        let error = SourceError::new(self.code, &self.message).with_origin(&self.name);
        Box::pin(async move { Err(error) })
    }
}
