//! Local vector index kept in the application database.
//!
//! Embeddings are stored as f32 BLOBs and ranked by brute-force cosine
//! similarity over the queried namespace.

use std::sync::Arc;

use async_trait::async_trait;

use super::{IndexEntry, ScoredChunk, VectorIndex};
use crate::db::models::VectorRow;
use crate::db::Database;
use crate::embedding::cosine_similarity;
use crate::error::{DocQaError, Result};
use crate::splitter::{Chunk, ChunkMetadata};

pub struct SqliteIndex {
    db: Arc<Database>,
}

impl SqliteIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

/// Score every row against the query and keep the best `top_k`.
fn search_similar(query: &[f32], rows: Vec<VectorRow>, top_k: usize) -> Vec<(VectorRow, f32)> {
    let mut scored: Vec<(VectorRow, f32)> = rows
        .into_iter()
        .map(|row| {
            let score = cosine_similarity(query, &row.embedding);
            (row, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> Result<usize> {
        let rows = entries
            .iter()
            .map(|entry| {
                let metadata = serde_json::to_string(&entry.chunk.metadata)
                    .map_err(|e| DocQaError::IndexWriteFailure(e.to_string()))?;
                Ok((
                    uuid::Uuid::new_v4().to_string(),
                    VectorRow {
                        chunk_id: entry.chunk.metadata.id.clone(),
                        content: entry.chunk.content.clone(),
                        metadata,
                        embedding: entry.embedding.clone(),
                    },
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.db
            .insert_vectors(namespace, &rows)
            .map_err(|e| DocQaError::IndexWriteFailure(e.to_string()))?;
        Ok(rows.len())
    }

    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = self
            .db
            .vectors_in_namespace(namespace)
            .map_err(|e| DocQaError::RetrievalFailure(e.to_string()))?;

        search_similar(vector, rows, top_k)
            .into_iter()
            .map(|(row, score)| {
                let metadata: ChunkMetadata = serde_json::from_str(&row.metadata)
                    .map_err(|e| DocQaError::RetrievalFailure(format!("bad metadata for {}: {}", row.chunk_id, e)))?;
                Ok(ScoredChunk {
                    chunk: Chunk {
                        content: row.content,
                        metadata,
                    },
                    score,
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
