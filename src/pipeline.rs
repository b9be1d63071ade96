//! Ingestion: load a file, split it, embed the chunks and index them.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::conversation::{conversation_folder, list_uploaded_files, save_upload};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{Indexer, VectorIndex, DEFAULT_NAMESPACE};
use crate::loader::DocumentLoader;
use crate::splitter::RecursiveSplitter;

/// Counts from one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub file_path: String,
    pub segments: usize,
    pub chunks: usize,
    pub indexed: usize,
}

pub struct Pipeline<'a> {
    loader: &'a DocumentLoader,
    splitter: &'a RecursiveSplitter,
    indexer: Indexer<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        loader: &'a DocumentLoader,
        splitter: &'a RecursiveSplitter,
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
    ) -> Self {
        Self {
            loader,
            splitter,
            indexer: Indexer::new(embedder, index),
        }
    }

    pub async fn process_file(&self, path: &Path, namespace: Option<&str>) -> Result<IngestReport> {
        let file_path = path.display().to_string();
        tracing::info!(file_path, namespace = namespace.unwrap_or(DEFAULT_NAMESPACE), "processing file");

        let segments = self.loader.load(path).await?;
        let chunks = self.splitter.split_segments(&file_path, &segments);
        let chunk_count = chunks.len();
        let indexed = self.indexer.index(chunks, namespace).await?;

        let report = IngestReport {
            file_path,
            segments: segments.len(),
            chunks: chunk_count,
            indexed,
        };
        tracing::info!(?report, "file processed");
        Ok(report)
    }
}

/// Upload folders on disk plus the pipeline that indexes what lands in them.
pub struct Workspace<'a> {
    upload_root: PathBuf,
    pipeline: Pipeline<'a>,
}

impl<'a> Workspace<'a> {
    pub fn new(upload_root: impl Into<PathBuf>, pipeline: Pipeline<'a>) -> Self {
        Self {
            upload_root: upload_root.into(),
            pipeline,
        }
    }

    pub fn folder(&self, conversation: &str) -> PathBuf {
        conversation_folder(&self.upload_root, conversation)
    }

    /// Store `source` under the conversation's folder and index it into the
    /// conversation's namespace.
    pub async fn upload(&self, conversation: &str, source: &Path) -> Result<IngestReport> {
        let stored = save_upload(&self.folder(conversation), source)?;
        self.pipeline.process_file(&stored, Some(conversation)).await
    }

    pub fn files(&self, conversation: &str) -> Result<Vec<String>> {
        list_uploaded_files(&self.folder(conversation))
    }
}
