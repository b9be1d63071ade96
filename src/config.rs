use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{DocQaError, Result};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo-0125";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_CHUNK_SIZE: usize = 5000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 500;
pub const DEFAULT_TOP_K: usize = 5;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProviderKind {
    OpenAi,
    Claude,
    Ollama,
}

impl FromStr for ChatProviderKind {
    type Err = DocQaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "claude" | "anthropic" => Ok(Self::Claude),
            "ollama" => Ok(Self::Ollama),
            other => Err(DocQaError::config(format!("unknown CHAT_PROVIDER: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    Pinecone,
    Sqlite,
}

impl FromStr for VectorBackend {
    type Err = DocQaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pinecone" => Ok(Self::Pinecone),
            "sqlite" | "local" => Ok(Self::Sqlite),
            other => Err(DocQaError::config(format!("unknown VECTOR_BACKEND: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PineconeSettings {
    pub api_key: Option<String>,
    pub index_name: Option<String>,
    /// Data-plane host; resolved from the control plane when unset.
    pub index_host: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub ollama_host: String,
    pub chat_provider: ChatProviderKind,
    pub chat_model: String,
    pub embedding_model: String,
    pub vector_backend: VectorBackend,
    pub pinecone: PineconeSettings,
    pub llama_api_key: Option<String>,
    pub upload_folder: PathBuf,
    pub database_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let opt = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| opt(key).unwrap_or_else(|| default.to_string());

        let chat_provider = match opt("CHAT_PROVIDER") {
            Some(v) => v.parse()?,
            None => ChatProviderKind::OpenAi,
        };
        let vector_backend = match opt("VECTOR_BACKEND") {
            Some(v) => v.parse()?,
            None => VectorBackend::Pinecone,
        };

        let config = Self {
            openai_api_key: opt("OPENAI_API_KEY"),
            openai_base_url: or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            anthropic_api_key: opt("ANTHROPIC_API_KEY"),
            anthropic_base_url: or("ANTHROPIC_BASE_URL", DEFAULT_ANTHROPIC_BASE_URL),
            ollama_host: or("OLLAMA_HOST", DEFAULT_OLLAMA_HOST),
            chat_provider,
            chat_model: or("CHAT_MODEL", DEFAULT_CHAT_MODEL),
            embedding_model: or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            vector_backend,
            pinecone: PineconeSettings {
                api_key: opt("PINECONE_API_KEY"),
                index_name: opt("PINECONE_INDEX_NAME"),
                index_host: opt("PINECONE_INDEX_HOST"),
            },
            llama_api_key: opt("LLAMA_API_KEY"),
            upload_folder: PathBuf::from(or("UPLOAD_FOLDER", "uploads")),
            database_path: PathBuf::from(or("DATABASE_PATH", "conversations.db")),
            chunk_size: parse_or("CHUNK_SIZE", opt("CHUNK_SIZE"), DEFAULT_CHUNK_SIZE)?,
            chunk_overlap: parse_or("CHUNK_OVERLAP", opt("CHUNK_OVERLAP"), DEFAULT_CHUNK_OVERLAP)?,
            top_k: parse_or("TOP_K", opt("TOP_K"), DEFAULT_TOP_K)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DocQaError::config("CHUNK_SIZE must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(DocQaError::config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(DocQaError::config("TOP_K must be positive"));
        }
        Ok(())
    }

    pub fn openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| DocQaError::config("OPENAI_API_KEY is not set"))
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| DocQaError::config(format!("{key} has an invalid value: {v}"))),
        None => Ok(default),
    }
}
