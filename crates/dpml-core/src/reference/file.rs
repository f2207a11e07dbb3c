//! `file:` references.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::ProtocolHandler;
use crate::ast::{Reference, ReferenceValue};
use crate::context::ProcessingContext;
use crate::error::ProtocolError;

/// Reads local files.
///
/// Relative paths are tried against the directory of the document being
/// processed, then the configured base directory, then the working
/// directory. Both `/` and `\` separate path segments. `.json` files are
/// parsed, anything else is returned as text. A `#fragment` suffix is not
/// part of the file path and is ignored here.
#[derive(Debug, Clone, Default)]
pub struct FileProtocolHandler {
    base_dir: Option<PathBuf>,
}

impl FileProtocolHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Candidate locations for `raw`, in lookup order.
    fn candidates(&self, raw: &str, document_path: &str) -> Vec<PathBuf> {
        let normalized = normalize_separators(raw);
        let path = Path::new(&normalized);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }

        let mut candidates = Vec::new();
        if !document_path.is_empty()
            && let Some(dir) = Path::new(&normalize_separators(document_path)).parent()
        {
            candidates.push(dir.join(path));
        }
        if let Some(base) = &self.base_dir {
            candidates.push(base.join(path));
        }
        candidates.push(path.to_path_buf());
        candidates
    }

    /// First candidate that exists, or the first candidate when none does.
    fn locate(&self, raw: &str, document_path: &str) -> PathBuf {
        let candidates = self.candidates(raw, document_path);
        candidates
            .iter()
            .find(|candidate| candidate.exists())
            .or_else(|| candidates.first())
            .cloned()
            .unwrap_or_else(|| PathBuf::from(raw))
    }
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn strip_fragment(path: &str) -> &str {
    path.split_once('#').map_or(path, |(file, _)| file)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[async_trait]
impl ProtocolHandler for FileProtocolHandler {
    fn name(&self) -> &str {
        "file"
    }

    fn can_handle(&self, protocol: &str) -> bool {
        protocol == "file"
    }

    async fn handle(
        &self,
        reference: &Reference,
        ctx: &ProcessingContext,
    ) -> Result<ReferenceValue, ProtocolError> {
        let raw = strip_fragment(&reference.path);
        let path = self.locate(raw, &ctx.path);
        let display = path.display().to_string();

        let text = std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ProtocolError::FileNotFound(display.clone()),
            io::ErrorKind::PermissionDenied => ProtocolError::PermissionDenied(display.clone()),
            _ => ProtocolError::Io {
                path: display.clone(),
                source,
            },
        })?;

        if is_json(&path) {
            let value = serde_json::from_str(&text).map_err(|source| ProtocolError::Json {
                path: display,
                source,
            })?;
            Ok(ReferenceValue::Json(value))
        } else {
            Ok(ReferenceValue::Text(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Document;
    use crate::error_handler::ErrorHandler;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context_for(path: &str) -> ProcessingContext {
        ProcessingContext::new(
            Arc::new(Document::default()),
            path,
            Arc::new(ErrorHandler::default()),
        )
    }

    #[tokio::test]
    async fn test_relative_to_document() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("snippet.txt"), "Hello").unwrap();
        let doc_path = dir.path().join("main.dpml");
        let ctx = context_for(doc_path.to_str().unwrap());

        let value = FileProtocolHandler::new()
            .handle(&Reference::new("file", "./snippet.txt"), &ctx)
            .await
            .unwrap();

        assert_eq!(value, ReferenceValue::Text("Hello".into()));
    }

    #[tokio::test]
    async fn test_base_dir_and_json() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("shared")).unwrap();
        std::fs::write(dir.path().join("shared").join("data.json"), r#"{"n": 3}"#).unwrap();
        let ctx = context_for("");

        let handler = FileProtocolHandler::with_base_dir(dir.path());
        let value = handler
            .handle(&Reference::new("file", "shared\\data.json#ignored"), &ctx)
            .await
            .unwrap();

        assert_eq!(value, ReferenceValue::Json(json!({"n": 3})));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context_for("");
        let handler = FileProtocolHandler::with_base_dir(dir.path());

        let err = handler
            .handle(&Reference::new("file", "absent.txt"), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ProtocolError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bad.json");
        std::fs::write(&file, "{ nope").unwrap();
        let ctx = context_for("");

        let err = FileProtocolHandler::new()
            .handle(&Reference::new("file", file.to_str().unwrap()), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ProtocolError::Json { .. }));
    }

    #[test]
    fn test_candidate_order() {
        let handler = FileProtocolHandler::with_base_dir("/base");
        let candidates = handler.candidates("a/b.txt", "/docs/main.dpml");
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/docs/a/b.txt"),
                PathBuf::from("/base/a/b.txt"),
                PathBuf::from("a/b.txt"),
            ]
        );
    }
}
