//! Namespaced vector storage for chunks.

pub mod pinecone;
pub mod sqlite;

use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::splitter::Chunk;

/// Namespace used when a write or query names none.
pub const DEFAULT_NAMESPACE: &str = "";

/// A chunk paired with its embedding, ready to be written.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Storage for embedded chunks, partitioned by namespace.
///
/// Entries get fresh ids on every write; writing the same chunk twice stores it twice.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> Result<usize>;

    /// Nearest neighbours of `vector` within `namespace`, best first.
    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;

    fn name(&self) -> &'static str;
}

/// Embeds chunks and writes them to a vector index.
pub struct Indexer<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
}

impl<'a> Indexer<'a> {
    pub fn new(embedder: &'a dyn Embedder, index: &'a dyn VectorIndex) -> Self {
        Self { embedder, index }
    }

    pub async fn index(&self, chunks: Vec<Chunk>, namespace: Option<&str>) -> Result<usize> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await.inspect_err(|e| {
            tracing::error!(error = %e, "error embedding chunks");
        })?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let written = self.index.upsert(namespace, &entries).await.inspect_err(|e| {
            tracing::error!(index = self.index.name(), namespace, error = %e, "error saving to vector index");
        })?;
        tracing::info!(index = self.index.name(), namespace, written, "saved chunks to vector index");
        Ok(written)
    }
}
