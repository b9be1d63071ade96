use super::{ChatRequest, LlmError, LineBuffer, StreamChunk};
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessageParam<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct MessageParam<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: TextDelta },
    #[serde(rename = "message_stop")]
    MessageStop {},
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct TextDelta {
    text: Option<String>,
}

/// Anthropic takes system text as a top-level field, not as a message.
fn build_body(request: &ChatRequest, stream: bool) -> MessagesBody<'_> {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();

    MessagesBody {
        model: &request.model,
        max_tokens: MAX_TOKENS,
        messages: request
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| MessageParam {
                role: &m.role,
                content: &m.content,
            })
            .collect(),
        stream,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
    }
}

async fn send(
    client: &Client,
    config: &ClaudeConfig,
    body: &MessagesBody<'_>,
) -> Result<Response, LlmError> {
    let resp = client
        .post(format!("{}/v1/messages", config.base_url.trim_end_matches('/')))
        .header("Content-Type", "application/json")
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api { status, message });
    }
    Ok(resp)
}

pub async fn chat(
    client: &Client,
    config: &ClaudeConfig,
    request: &ChatRequest,
) -> Result<String, LlmError> {
    let resp = send(client, config, &build_body(request, false)).await?;
    let data: MessagesResponse = resp.json().await?;
    Ok(data
        .content
        .into_iter()
        .map(|block| block.text)
        .collect::<Vec<_>>()
        .join(""))
}

pub async fn chat_stream(
    client: &Client,
    config: &ClaudeConfig,
    request: &ChatRequest,
    on_chunk: impl Fn(StreamChunk) + Send,
) -> Result<String, LlmError> {
    let resp = send(client, config, &build_body(request, true)).await?;

    let mut full_content = String::new();
    let mut stream = resp.bytes_stream();
    let mut lines = LineBuffer::default();

    'outer: while let Some(chunk) = stream.next().await {
        lines.push(&chunk?);

        while let Some(line) = lines.next_line() {
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            match serde_json::from_str::<StreamEvent>(data.trim()) {
                Ok(StreamEvent::ContentBlockDelta {
                    delta: TextDelta { text: Some(text) },
                }) => {
                    full_content.push_str(&text);
                    on_chunk(StreamChunk {
                        delta: text,
                        done: false,
                    });
                }
                Ok(StreamEvent::MessageStop {}) => break 'outer,
                _ => {}
            }
        }
    }

    on_chunk(StreamChunk {
        delta: String::new(),
        done: true,
    });
    Ok(full_content)
}
