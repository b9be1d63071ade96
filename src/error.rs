use std::path::PathBuf;

use crate::llm::LlmError;

/// Every failure the ingestion and answering paths can report.
#[derive(Debug, thiserror::Error)]
pub enum DocQaError {
    #[error("unsupported file format: .{0}")]
    UnsupportedFormat(String),

    #[error("failed to parse {path:?}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },

    #[error("embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("vector index write failed: {0}")]
    IndexWriteFailure(String),

    #[error("retrieval failed: {0}")]
    RetrievalFailure(String),

    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
}

pub type Result<T, E = DocQaError> = std::result::Result<T, E>;

impl DocQaError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ParseFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocQaError::UnsupportedFormat("exe".into());
        assert_eq!(err.to_string(), "unsupported file format: .exe");

        let err = DocQaError::parse("a/b.pdf", "no text content");
        assert!(err.to_string().contains("no text content"));
        assert!(err.to_string().contains("b.pdf"));
    }
}
