//! Local file source.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::source::{BoxFuture, FetchedDocument, ScheduleSource};

/// Reads a saved schedule page or feed from disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn content_type(&self) -> Option<&'static str> {
        let ext = self.path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json" => Some("application/json"),
            "html" | "htm" => Some("text/html"),
            _ => None,
        }
    }
}

impl ScheduleSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> BoxFuture<'_, SourceResult<FetchedDocument>> {
        Box::pin(async move {
            let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                SourceError::io(format!("Failed to read {}", self.path.display()), e)
                    .with_origin(&self.name)
            })?;
            debug!(source = %self.name, path = %self.path.display(), bytes = body.len(), "read schedule file");

            let doc = FetchedDocument::new(&self.name, body);
            Ok(match self.content_type() {
                Some(ct) => doc.with_content_type(ct),
                None => doc,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceErrorCode;
    use std::io::Write;

    #[tokio::test]
    async fn reads_file_and_infers_content_type() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"status\":\"success\"}}").unwrap();

        let source = FileSource::new("feed", file.path());
        let doc = source.fetch().await.unwrap();
        assert_eq!(doc.source, "feed");
        assert_eq!(doc.body, "{\"status\":\"success\"}");
        assert_eq!(doc.content_type.as_deref(), Some("application/json"));
        assert_eq!(doc.suggested_parser(), "slots");
    }

    #[tokio::test]
    async fn unknown_extension_leaves_content_type_unset() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "<table id=\"schedule\"></table>").unwrap();

        let doc = FileSource::new("page", file.path()).fetch().await.unwrap();
        assert!(doc.content_type.is_none());
        assert_eq!(doc.suggested_parser(), "table");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new("gone", dir.path().join("missing.html"));

        let err = source.fetch().await.unwrap_err();
        assert_eq!(err.code(), SourceErrorCode::NotFound);
        assert_eq!(err.origin(), Some("gone"));
        assert!(err.message().contains("missing.html"));
    }
}
