//! ScheduleSource trait and implementations.
//!
//! This crate moves raw schedule documents from where they live to the
//! parsers in `shiftboard-core`:
//!
//! - [`ScheduleSource`] - The trait every source implements
//! - [`FileSource`] - A saved page or feed on disk
//! - [`HttpSource`] - A schedule page or slot feed behind a session and CSRF token
//! - [`fetch_all`] - Concurrent fetching with retry
//! - [`SourceError`] - Transport errors
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐
//! │  file on disk   │    │   web portal    │
//! └────────┬────────┘    └────────┬────────┘
//!          │                      │
//!          ▼                      ▼
//! ┌─────────────────┐    ┌─────────────────┐
//! │   FileSource    │    │   HttpSource    │
//! └────────┬────────┘    └────────┬────────┘
//!          │                      │
//!          │    ScheduleSource    │
//!          └──────────┬───────────┘
//!                     │ fetch_all()
//!                     ▼
//!             ┌──────────────────┐
//!             │ FetchedDocument  │
//!             └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use shiftboard_sources::{fetch_all, FileSource, RetryPolicy, ScheduleSource};
//!
//! let sources: Vec<Box<dyn ScheduleSource>> = vec![Box::new(FileSource::new("week", "week.html"))];
//! for result in fetch_all(&sources, RetryPolicy::default()).await {
//!     let doc = result?;
//!     println!("{} bytes from {}", doc.body.len(), doc.source);
//! }
//! ```

#[cfg(feature = "http")]
pub mod continuation;
pub mod error;
pub mod fetch;
pub mod file;
#[cfg(feature = "http")]
pub mod http;
pub mod source;

// Re-export main types at crate root
pub use error::{SourceError, SourceErrorCode, SourceResult};
pub use fetch::{RetryPolicy, fetch_all, fetch_with_retry};
pub use file::FileSource;
#[cfg(feature = "http")]
pub use continuation::SlotContinuation;
#[cfg(feature = "http")]
pub use http::{CSRF_HEADER, HttpConfig, HttpSource, extract_csrf};
pub use source::{BoxFuture, ErrorSource, FetchedDocument, ScheduleSource, StaticSource};
