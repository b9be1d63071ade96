use crate::error::{DocQaError, Result};
use crate::llm::openai::OpenAiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Texts sent per embeddings request.
const EMBED_BATCH_SIZE: usize = 64;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// A hosted embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| DocQaError::EmbeddingFailure("no embedding returned for query".into()))
    }
}

/// Embeddings through the OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiConfig,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(client: Client, config: OpenAiConfig, model: impl Into<String>) -> Self {
        Self {
            client,
            config,
            model: model.into(),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let resp = self
            .config
            .post_json(&self.client, "/embeddings", &body)
            .await
            .map_err(|e| DocQaError::EmbeddingFailure(e.to_string()))?;

        let mut data: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| DocQaError::EmbeddingFailure(e.to_string()))?;
        if data.data.len() != texts.len() {
            return Err(DocQaError::EmbeddingFailure(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.data.len()
            )));
        }
        data.data.sort_by_key(|d| d.index);
        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            tracing::debug!(model = %self.model, batch = batch.len(), "requesting embeddings");
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(embeddings)
    }
}

/// Cosine of the angle between `a` and `b`; 0 for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Little-endian f32 BLOB layout used by the local index.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
