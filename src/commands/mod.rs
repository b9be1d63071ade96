//! Operations behind the CLI subcommands.
//!
//! Each command takes an [`AppContext`] and returns plain data; printing is
//! left to the binary.

pub mod chat;
pub mod conversation;
pub mod knowledge;
pub mod settings;

use std::sync::Arc;

use reqwest::Client;

use crate::config::{Config, VectorBackend};
use crate::db::models::Conversation;
use crate::db::Database;
use crate::embedding::OpenAiEmbedder;
use crate::error::{DocQaError, Result};
use crate::index::pinecone::PineconeIndex;
use crate::index::sqlite::SqliteIndex;
use crate::index::VectorIndex;
use crate::llm::openai::OpenAiConfig;
use crate::loader::remote::{RemoteParser, RemoteParserConfig};
use crate::loader::DocumentLoader;
use crate::splitter::RecursiveSplitter;

/// Config plus the process-wide handles every command shares.
pub struct AppContext {
    pub config: Config,
    pub client: Client,
    pub db: Arc<Database>,
}

impl AppContext {
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        tracing::debug!(path = %config.database_path.display(), "opened database");
        Ok(Self::with_database(config, db))
    }

    pub fn with_database(config: Config, db: Database) -> Self {
        Self {
            config,
            client: Client::new(),
            db: Arc::new(db),
        }
    }

    /// Look up a conversation by name, failing when it was never created.
    pub fn conversation(&self, name: &str) -> Result<Conversation> {
        self.db
            .get_conversation_by_name(name)?
            .ok_or_else(|| DocQaError::UnknownConversation(name.to_string()))
    }

    pub fn embedder(&self) -> Result<OpenAiEmbedder> {
        let config = OpenAiConfig {
            api_key: self.config.openai_key()?.to_string(),
            base_url: self.config.openai_base_url.clone(),
        };
        Ok(OpenAiEmbedder::new(
            self.client.clone(),
            config,
            self.config.embedding_model.clone(),
        ))
    }

    pub async fn vector_index(&self) -> Result<Box<dyn VectorIndex>> {
        let index: Box<dyn VectorIndex> = match self.config.vector_backend {
            VectorBackend::Pinecone => {
                Box::new(PineconeIndex::connect(self.client.clone(), &self.config.pinecone).await?)
            }
            VectorBackend::Sqlite => Box::new(SqliteIndex::new(self.db.clone())),
        };
        tracing::debug!(index = index.name(), "using vector index");
        Ok(index)
    }

    /// Local loaders, plus the remote parser when `LLAMA_API_KEY` is set.
    pub fn loader(&self) -> DocumentLoader {
        let remote = self
            .config
            .llama_api_key
            .as_ref()
            .map(|key| RemoteParser::new(self.client.clone(), RemoteParserConfig::new(key.clone())));
        DocumentLoader::new(remote)
    }

    pub fn splitter(&self) -> Result<RecursiveSplitter> {
        RecursiveSplitter::new(self.config.chunk_size, self.config.chunk_overlap)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::local_context;
    use super::*;

    #[tokio::test]
    async fn test_context_wiring() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = local_context("http://127.0.0.1:9", dir.path());

        assert_eq!(ctx.vector_index().await.unwrap().name(), "sqlite");
        assert!(ctx.embedder().is_ok());
        assert_eq!(ctx.splitter().unwrap().chunk_size(), 200);
        assert!(matches!(
            ctx.conversation("20240101_00000000"),
            Err(DocQaError::UnknownConversation(_))
        ));
    }

    #[tokio::test]
    async fn test_pinecone_backend_needs_key() {
        let config = Config::from_lookup(|_| None).unwrap();
        let ctx = AppContext::with_database(config, Database::open_in_memory().unwrap());
        assert!(matches!(ctx.vector_index().await, Err(DocQaError::Config(_))));
        assert!(matches!(ctx.embedder(), Err(DocQaError::Config(_))));
    }
}
