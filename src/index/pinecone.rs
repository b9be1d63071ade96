//! Pinecone vector index over its REST data plane.
//!
//! Chunk text is stored in the vector metadata under `text`, next to the
//! chunk's positional metadata, so a query returns everything needed to
//! rebuild the chunk.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{IndexEntry, ScoredChunk, VectorIndex};
use crate::config::PineconeSettings;
use crate::error::{DocQaError, Result};
use crate::splitter::{Chunk, ChunkMetadata};

pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const UPSERT_BATCH_SIZE: usize = 100;
const TEXT_KEY: &str = "text";

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    namespace: &'a str,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: String,
    values: &'a [f32],
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

fn to_metadata(chunk: &Chunk) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in &chunk.metadata.extra {
        map.insert(key.clone(), Value::String(value.clone()));
    }
    map.insert("file_path".into(), Value::String(chunk.metadata.file_path.clone()));
    map.insert("page".into(), Value::String(chunk.metadata.page.to_string()));
    map.insert("chunk".into(), Value::String(chunk.metadata.chunk.to_string()));
    map.insert("id".into(), Value::String(chunk.metadata.id.clone()));
    map.insert(TEXT_KEY.into(), Value::String(chunk.content.clone()));
    map
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn index_field(value: Option<&Value>) -> usize {
    match value {
        // Pinecone hands numeric metadata back as floats.
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f as u64))
            .unwrap_or(0) as usize,
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn from_match(m: QueryMatch) -> ScoredChunk {
    let mut metadata = m.metadata;
    let content = metadata
        .remove(TEXT_KEY)
        .map(|v| value_to_string(&v))
        .unwrap_or_default();
    let file_path = metadata
        .remove("file_path")
        .map(|v| value_to_string(&v))
        .unwrap_or_default();
    let page = index_field(metadata.remove("page").as_ref());
    let chunk = index_field(metadata.remove("chunk").as_ref());
    let id = metadata
        .remove("id")
        .map(|v| value_to_string(&v))
        .unwrap_or(m.id);
    let extra: BTreeMap<String, String> = metadata
        .iter()
        .map(|(k, v)| (k.clone(), value_to_string(v)))
        .collect();

    ScoredChunk {
        chunk: Chunk {
            content,
            metadata: ChunkMetadata {
                file_path,
                page,
                chunk,
                id,
                extra,
            },
        },
        score: m.score,
    }
}

pub struct PineconeIndex {
    client: Client,
    api_key: String,
    host: String,
}

impl PineconeIndex {
    pub fn new(client: Client, api_key: impl Into<String>, host: impl Into<String>) -> Self {
        let host = host.into();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };
        Self {
            client,
            api_key: api_key.into(),
            host: host.trim_end_matches('/').to_string(),
        }
    }

    /// Build from settings, asking the control plane for the index host when
    /// none is configured.
    pub async fn connect(client: Client, settings: &PineconeSettings) -> Result<Self> {
        Self::connect_via(client, settings, CONTROL_PLANE_URL).await
    }

    pub async fn connect_via(
        client: Client,
        settings: &PineconeSettings,
        control_plane: &str,
    ) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| DocQaError::config("PINECONE_API_KEY is not set"))?;
        if let Some(host) = &settings.index_host {
            return Ok(Self::new(client, api_key, host.clone()));
        }
        let index_name = settings
            .index_name
            .as_deref()
            .ok_or_else(|| DocQaError::config("PINECONE_INDEX_NAME is not set"))?;

        let resp = client
            .get(format!("{}/indexes/{}", control_plane.trim_end_matches('/'), index_name))
            .header("Api-Key", &api_key)
            .send()
            .await
            .map_err(|e| DocQaError::config(format!("cannot reach Pinecone: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DocQaError::config(format!(
                "cannot describe Pinecone index {index_name}: {status} - {body}"
            )));
        }
        let described: DescribeIndexResponse = resp
            .json()
            .await
            .map_err(|e| DocQaError::config(format!("unexpected Pinecone response: {e}")))?;
        tracing::debug!(index = index_name, host = %described.host, "resolved Pinecone host");
        Ok(Self::new(client, api_key, described.host))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> std::result::Result<reqwest::Response, String> {
        let resp = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("Pinecone API error: {} - {}", status, text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> Result<usize> {
        let mut written = 0;
        for batch in entries.chunks(UPSERT_BATCH_SIZE) {
            let body = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|entry| UpsertVector {
                        id: uuid::Uuid::new_v4().to_string(),
                        values: &entry.embedding,
                        metadata: to_metadata(&entry.chunk),
                    })
                    .collect(),
                namespace,
            };
            let resp = self
                .post("/vectors/upsert", &body)
                .await
                .map_err(DocQaError::IndexWriteFailure)?;
            let parsed: UpsertResponse = resp
                .json()
                .await
                .map_err(|e| DocQaError::IndexWriteFailure(e.to_string()))?;
            written += parsed.upserted_count.unwrap_or(batch.len());
        }
        Ok(written)
    }

    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let body = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let resp = self
            .post("/query", &body)
            .await
            .map_err(DocQaError::RetrievalFailure)?;
        let parsed: QueryResponse = resp
            .json()
            .await
            .map_err(|e| DocQaError::RetrievalFailure(e.to_string()))?;
        Ok(parsed.matches.into_iter().map(from_match).collect())
    }

    fn name(&self) -> &'static str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::chunk_id;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_chunk() -> Chunk {
        let mut extra = BTreeMap::new();
        extra.insert("source".to_string(), "uploads/c/a.pdf".to_string());
        Chunk {
            content: "The invoice is due in March.".into(),
            metadata: ChunkMetadata {
                file_path: "uploads/c/a.pdf".into(),
                page: 2,
                chunk: 7,
                id: chunk_id("uploads/c/a.pdf", 2, 7),
                extra,
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_sends_namespace_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "pc-test"))
            .and(body_partial_json(serde_json::json!({ "namespace": "20240101_abcd1234" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "upsertedCount": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let index = PineconeIndex::new(Client::new(), "pc-test", server.uri());
        let written = index
            .upsert(
                "20240101_abcd1234",
                &[IndexEntry {
                    chunk: sample_chunk(),
                    embedding: vec![0.1, 0.2],
                }],
            )
            .await
            .unwrap();
        assert_eq!(written, 1);

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let metadata = &body["vectors"][0]["metadata"];
        assert_eq!(metadata["text"], "The invoice is due in March.");
        assert_eq!(metadata["id"], "uploads/c/a.pdf:2:7");
        assert_ne!(body["vectors"][0]["id"], "uploads/c/a.pdf:2:7");
    }

    #[tokio::test]
    async fn test_query_rebuilds_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(serde_json::json!({
                "namespace": "conv",
                "topK": 5,
                "includeMetadata": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "matches": [{
                    "id": "5f0c",
                    "score": 0.91,
                    "metadata": {
                        "text": "The invoice is due in March.",
                        "file_path": "uploads/c/a.pdf",
                        "page": "2",
                        "chunk": 7.0,
                        "id": "uploads/c/a.pdf:2:7",
                        "source": "uploads/c/a.pdf"
                    }
                }],
                "namespace": "conv"
            })))
            .mount(&server)
            .await;

        let index = PineconeIndex::new(Client::new(), "pc-test", server.uri());
        let hits = index.query("conv", &[0.1, 0.2], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert!((hit.score - 0.91).abs() < 1e-6);
        assert_eq!(hit.chunk, sample_chunk());
    }

    #[tokio::test]
    async fn test_write_error_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let index = PineconeIndex::new(Client::new(), "bad", server.uri());
        let err = index
            .upsert(
                "",
                &[IndexEntry {
                    chunk: sample_chunk(),
                    embedding: vec![0.0],
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocQaError::IndexWriteFailure(_)));
    }

    #[tokio::test]
    async fn test_connect_resolves_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/docs"))
            .and(header("Api-Key", "pc-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "docs",
                "host": "docs-abc123.svc.pinecone.io"
            })))
            .mount(&server)
            .await;

        let settings = PineconeSettings {
            api_key: Some("pc-test".into()),
            index_name: Some("docs".into()),
            index_host: None,
        };
        let index = PineconeIndex::connect_via(Client::new(), &settings, &server.uri())
            .await
            .unwrap();
        assert_eq!(index.host, "https://docs-abc123.svc.pinecone.io");

        let missing = PineconeSettings {
            api_key: None,
            ..settings
        };
        assert!(matches!(
            PineconeIndex::connect_via(Client::new(), &missing, &server.uri()).await,
            Err(DocQaError::Config(_))
        ));
    }
}
