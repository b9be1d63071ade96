//! File loading: extension → format kind → text segments.
//!
//! Local formats are parsed in-process. Richer formats (slides, legacy Office,
//! HTML, ebooks) go to the remote parsing service when it is configured.

pub mod local;
pub mod remote;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DocQaError, Result};
use remote::RemoteParser;

/// One unit of loaded text: a PDF page, a CSV row, a sheet, or a whole file.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

impl Segment {
    pub fn new(content: impl Into<String>, path: &Path) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), path.display().to_string());
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Pdf,
    Docx,
    Csv,
    Xlsx,
    Markdown,
    Text,
    /// Parsed by the remote service; carries the lower-cased extension.
    Remote(&'static str),
}

const LOADERS: &[(&str, FormatKind)] = &[
    ("pdf", FormatKind::Pdf),
    ("docx", FormatKind::Docx),
    ("csv", FormatKind::Csv),
    ("xlsx", FormatKind::Xlsx),
    ("md", FormatKind::Markdown),
    ("markdown", FormatKind::Markdown),
    ("txt", FormatKind::Text),
    ("pptx", FormatKind::Remote("pptx")),
    ("ppt", FormatKind::Remote("ppt")),
    ("doc", FormatKind::Remote("doc")),
    ("xls", FormatKind::Remote("xls")),
    ("odt", FormatKind::Remote("odt")),
    ("rtf", FormatKind::Remote("rtf")),
    ("epub", FormatKind::Remote("epub")),
    ("html", FormatKind::Remote("html")),
    ("htm", FormatKind::Remote("htm")),
];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Pick the parsing strategy for a file from its extension.
pub fn select_loader(path: &Path) -> Result<FormatKind> {
    let ext = extension(path);
    LOADERS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, kind)| *kind)
        .ok_or(DocQaError::UnsupportedFormat(ext))
}

/// Loads files into segments, dispatching on [`FormatKind`].
pub struct DocumentLoader {
    remote: Option<RemoteParser>,
}

impl DocumentLoader {
    pub fn new(remote: Option<RemoteParser>) -> Self {
        Self { remote }
    }

    pub fn local_only() -> Self {
        Self { remote: None }
    }

    pub async fn load(&self, path: &Path) -> Result<Vec<Segment>> {
        let kind = select_loader(path)?;
        let result = match kind {
            FormatKind::Remote(ext) => match &self.remote {
                Some(parser) => parser.parse(path).await,
                None => Err(DocQaError::parse(
                    path,
                    format!(".{ext} needs the remote parser; set LLAMA_API_KEY"),
                )),
            },
            local_kind => local::load_local(local_kind, path),
        };

        match result {
            Ok(segments) if segments.iter().all(|s| s.content.trim().is_empty()) => {
                tracing::error!(path = %path.display(), "no text content extracted");
                Err(DocQaError::parse(path, "no text content"))
            }
            Ok(segments) => {
                tracing::info!(path = %path.display(), kind = ?kind, segments = segments.len(), "loaded document");
                Ok(segments)
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "error loading document");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_select_loader_supported() {
        let cases = [
            ("a/report.pdf", FormatKind::Pdf),
            ("a/report.PDF", FormatKind::Pdf),
            ("memo.docx", FormatKind::Docx),
            ("table.csv", FormatKind::Csv),
            ("book.xlsx", FormatKind::Xlsx),
            ("README.md", FormatKind::Markdown),
            ("notes.markdown", FormatKind::Markdown),
            ("notes.txt", FormatKind::Text),
            ("slides.pptx", FormatKind::Remote("pptx")),
            ("page.HTML", FormatKind::Remote("html")),
        ];
        for (file, expected) in cases {
            assert_eq!(select_loader(&PathBuf::from(file)).unwrap(), expected, "{file}");
        }
    }

    #[test]
    fn test_select_loader_unsupported() {
        match select_loader(Path::new("tool.exe")) {
            Err(DocQaError::UnsupportedFormat(ext)) => assert_eq!(ext, "exe"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
        assert!(matches!(
            select_loader(Path::new("Makefile")),
            Err(DocQaError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_format_without_parser() {
        let loader = DocumentLoader::local_only();
        let err = loader.load(Path::new("deck.pptx")).await.unwrap_err();
        assert!(matches!(err, DocQaError::ParseFailure { .. }));
    }

    #[tokio::test]
    async fn test_empty_file_is_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "   \n").unwrap();

        let err = DocumentLoader::local_only().load(&path).await.unwrap_err();
        assert!(matches!(err, DocQaError::ParseFailure { .. }));
    }
}
