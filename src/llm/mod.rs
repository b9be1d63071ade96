pub mod claude;
pub mod openai;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{ChatProviderKind, Config};
use crate::error::{DocQaError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: String,
    pub done: bool,
}

/// Accumulates raw response bytes and hands back complete lines.
///
/// Lines are decoded only once their `\n` has arrived, so a multi-byte
/// character split across network reads stays intact.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    pub(crate) fn next_line(&mut self) -> Option<String> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Unified LLM provider enum — dispatches to OpenAI-compatible or Claude backends.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(openai::OpenAiConfig),
    Claude(claude::ClaudeConfig),
    Ollama(openai::OpenAiConfig),
}

impl Provider {
    pub fn ollama(host: &str) -> Self {
        Provider::Ollama(openai::OpenAiConfig {
            api_key: String::new(),
            base_url: format!("{}/v1", host.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        match config.chat_provider {
            ChatProviderKind::OpenAi => Ok(Provider::OpenAi(openai::OpenAiConfig {
                api_key: config.openai_key()?.to_string(),
                base_url: config.openai_base_url.clone(),
            })),
            ChatProviderKind::Claude => {
                let api_key = config
                    .anthropic_api_key
                    .clone()
                    .ok_or_else(|| DocQaError::config("ANTHROPIC_API_KEY is not set"))?;
                Ok(Provider::Claude(claude::ClaudeConfig {
                    api_key,
                    base_url: config.anthropic_base_url.clone(),
                }))
            }
            ChatProviderKind::Ollama => Ok(Provider::ollama(&config.ollama_host)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi(_) => "openai",
            Provider::Claude(_) => "claude",
            Provider::Ollama(_) => "ollama",
        }
    }

    pub async fn chat(&self, client: &Client, request: &ChatRequest) -> Result<String, LlmError> {
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                openai::chat(client, config, request).await
            }
            Provider::Claude(config) => claude::chat(client, config, request).await,
        }
    }

    pub async fn chat_stream(
        &self,
        client: &Client,
        request: &ChatRequest,
        on_chunk: impl Fn(StreamChunk) + Send,
    ) -> Result<String, LlmError> {
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                openai::chat_stream(client, config, request, on_chunk).await
            }
            Provider::Claude(config) => claude::chat_stream(client, config, request, on_chunk).await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A hosted chat model that turns a message list into one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Like `complete`, reporting text deltas as they arrive.
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        on_delta: &(dyn for<'s> Fn(&'s str) + Send + Sync),
    ) -> Result<String, LlmError> {
        let content = self.complete(messages).await?;
        on_delta(&content);
        Ok(content)
    }
}

/// A provider bound to a model name and a shared HTTP client.
pub struct ChatClient {
    client: Client,
    provider: Provider,
    model: String,
}

impl ChatClient {
    pub fn new(client: Client, provider: Provider, model: impl Into<String>) -> Self {
        Self {
            client,
            provider,
            model: model.into(),
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Result<Self> {
        Ok(Self::new(
            client,
            Provider::from_config(config)?,
            config.chat_model.clone(),
        ))
    }

    fn request(&self, messages: &[ChatMessage], stream: bool) -> ChatRequest {
        ChatRequest {
            messages: messages.to_vec(),
            model: self.model.clone(),
            stream,
        }
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        tracing::debug!(provider = self.provider.name(), model = %self.model, "chat request");
        self.provider
            .chat(&self.client, &self.request(messages, false))
            .await
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        on_delta: &(dyn for<'s> Fn(&'s str) + Send + Sync),
    ) -> Result<String, LlmError> {
        tracing::debug!(provider = self.provider.name(), model = %self.model, "streaming chat request");
        self.provider
            .chat_stream(&self.client, &self.request(messages, true), |chunk| {
                if chunk.done {
                    tracing::debug!(model = %self.model, "stream finished");
                } else if !chunk.delta.is_empty() {
                    on_delta(&chunk.delta);
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_provider_from_config() {
        let config = Config::from_lookup(|key| match key {
            "CHAT_PROVIDER" => Some("ollama".into()),
            "OLLAMA_HOST" => Some("http://box:11434/".into()),
            _ => None,
        })
        .unwrap();
        match Provider::from_config(&config).unwrap() {
            Provider::Ollama(c) => assert_eq!(c.base_url, "http://box:11434/v1"),
            other => panic!("unexpected provider {other:?}"),
        }

        let config = Config::from_lookup(|key| match key {
            "CHAT_PROVIDER" => Some("claude".into()),
            _ => None,
        })
        .unwrap();
        assert!(matches!(
            Provider::from_config(&config),
            Err(DocQaError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_openai_chat_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "Paris." } }]
            })))
            .mount(&server)
            .await;

        let provider = Provider::OpenAi(openai::OpenAiConfig {
            api_key: "sk-test".into(),
            base_url: server.uri(),
        });
        let chat = ChatClient::new(Client::new(), provider, "gpt-test");
        let answer = chat
            .complete(&[ChatMessage::user("Capital of France?")])
            .await
            .unwrap();
        assert_eq!(answer, "Paris.");
    }

    #[test]
    fn test_line_buffer_waits_for_whole_line() {
        let line = "data: {\"text\":\"naïve 世界\"}\n";
        let bytes = line.as_bytes();
        // Cut inside the two-byte 'ï'.
        let cut = line.find('ï').unwrap() + 1;

        let mut lines = LineBuffer::default();
        lines.push(&bytes[..cut]);
        assert_eq!(lines.next_line(), None);
        lines.push(&bytes[cut..]);
        assert_eq!(lines.next_line().as_deref(), Some(line));
        assert_eq!(lines.next_line(), None);
    }

    #[tokio::test]
    async fn test_openai_stream_reports_deltas() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Grüße, \"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"世界\"},\"finish_reason\":null}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = Provider::OpenAi(openai::OpenAiConfig {
            api_key: "sk-test".into(),
            base_url: server.uri(),
        });
        let chat = ChatClient::new(Client::new(), provider, "gpt-test");
        let deltas = std::sync::Mutex::new(Vec::new());
        let full = chat
            .complete_stream(&[ChatMessage::user("Greet")], &|delta: &str| {
                deltas.lock().unwrap().push(delta.to_string())
            })
            .await
            .unwrap();

        assert_eq!(full, "Grüße, 世界");
        assert_eq!(*deltas.lock().unwrap(), vec!["Grüße, ", "世界"]);
    }

    #[tokio::test]
    async fn test_claude_stream_reports_deltas() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Привет\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "claude-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = Provider::Claude(claude::ClaudeConfig {
            api_key: "claude-key".into(),
            base_url: server.uri(),
        });
        let chat = ChatClient::new(Client::new(), provider, "claude-test");
        let seen = std::sync::Mutex::new(String::new());
        let full = chat
            .complete_stream(&[ChatMessage::user("hi")], &|delta: &str| {
                seen.lock().unwrap().push_str(delta)
            })
            .await
            .unwrap();

        assert_eq!(full, "Привет");
        assert_eq!(*seen.lock().unwrap(), "Привет");
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = Provider::Claude(claude::ClaudeConfig {
            api_key: "nope".into(),
            base_url: server.uri(),
        });
        let chat = ChatClient::new(Client::new(), provider, "claude-test");
        let err = chat.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, .. }));
    }
}
