//! Retrieval-augmented answering over one namespace.

use crate::config::DEFAULT_TOP_K;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{ScoredChunk, VectorIndex, DEFAULT_NAMESPACE};
use crate::llm::{ChatMessage, ChatModel};
use crate::splitter::Chunk;

const SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know.\n\nContext: ";

#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    /// Retrieved chunks, best match first.
    pub sources: Vec<Chunk>,
}

/// Chunk texts joined by a blank line.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_messages(question: &str, context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!("{SYSTEM_PROMPT}{context}")),
        ChatMessage::user(question),
    ]
}

pub struct Answerer<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    model: &'a dyn ChatModel,
    top_k: usize,
}

impl<'a> Answerer<'a> {
    pub fn new(embedder: &'a dyn Embedder, index: &'a dyn VectorIndex, model: &'a dyn ChatModel) -> Self {
        Self {
            embedder,
            index,
            model,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Embed the question and fetch the closest chunks in `namespace`.
    pub async fn retrieve(&self, question: &str, namespace: Option<&str>) -> Result<Vec<Chunk>> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let vector = self.embedder.embed_query(question).await.inspect_err(|e| {
            tracing::error!(error = %e, "error embedding question");
        })?;
        let hits = self
            .index
            .query(namespace, &vector, self.top_k)
            .await
            .inspect_err(|e| {
                tracing::error!(index = self.index.name(), namespace, error = %e, "error querying vector index");
            })?;
        tracing::info!(namespace, hits = hits.len(), "retrieved context");
        for hit in &hits {
            tracing::debug!(id = %hit.chunk.metadata.id, score = hit.score, "context chunk");
        }
        Ok(hits.into_iter().map(|ScoredChunk { chunk, .. }| chunk).collect())
    }

    pub async fn ask(&self, question: &str, namespace: Option<&str>) -> Result<Answer> {
        let sources = self.retrieve(question, namespace).await?;
        let messages = build_messages(question, &format_context(&sources));
        let answer = self.model.complete(&messages).await.inspect_err(|e| {
            tracing::error!(error = %e, "error generating answer");
        })?;
        Ok(Answer { answer, sources })
    }

    /// Like `ask`, handing answer text to `on_delta` as it is generated.
    pub async fn ask_stream(
        &self,
        question: &str,
        namespace: Option<&str>,
        on_delta: &(dyn for<'s> Fn(&'s str) + Send + Sync),
    ) -> Result<Answer> {
        let sources = self.retrieve(question, namespace).await?;
        let messages = build_messages(question, &format_context(&sources));
        let answer = self
            .model
            .complete_stream(&messages, on_delta)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, "error generating answer");
            })?;
        Ok(Answer { answer, sources })
    }
}
