use super::{ChatMessage, ChatRequest, LlmError, LineBuffer, StreamChunk};
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

/// Connection settings for any OpenAI-compatible endpoint (OpenAI itself or Ollama's `/v1`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl OpenAiConfig {
    /// POST a JSON body to `{base_url}{path}`, attaching the bearer token when one is set.
    pub(crate) async fn post_json<T: Serialize + ?Sized>(
        &self,
        client: &Client,
        path: &str,
        body: &T,
    ) -> Result<Response, LlmError> {
        let mut req = client
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .header("Content-Type", "application/json")
            .json(body);

        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }
        Ok(resp)
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

pub async fn chat(
    client: &Client,
    config: &OpenAiConfig,
    request: &ChatRequest,
) -> Result<String, LlmError> {
    let body = CompletionBody {
        model: &request.model,
        messages: &request.messages,
        stream: false,
    };
    let resp = config.post_json(client, "/chat/completions", &body).await?;

    let data: CompletionResponse = resp.json().await?;
    data.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| LlmError::Parse("completion returned no choices".into()))
}

/// One parsed server-sent event line of a streamed completion.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamResponse>(data) {
        Ok(parsed) => match parsed.choices.into_iter().next() {
            Some(StreamChoice {
                finish_reason: Some(_),
                ..
            }) => SseLine::Done,
            Some(StreamChoice {
                delta: StreamDelta { content: Some(text) },
                ..
            }) => SseLine::Delta(text),
            _ => SseLine::Skip,
        },
        Err(_) => SseLine::Skip,
    }
}

pub async fn chat_stream(
    client: &Client,
    config: &OpenAiConfig,
    request: &ChatRequest,
    on_chunk: impl Fn(StreamChunk) + Send,
) -> Result<String, LlmError> {
    let body = CompletionBody {
        model: &request.model,
        messages: &request.messages,
        stream: true,
    };
    let resp = config.post_json(client, "/chat/completions", &body).await?;

    let mut full_content = String::new();
    let mut stream = resp.bytes_stream();
    let mut lines = LineBuffer::default();

    'outer: while let Some(chunk) = stream.next().await {
        lines.push(&chunk?);

        while let Some(line) = lines.next_line() {
            match parse_sse_line(&line) {
                SseLine::Delta(delta) => {
                    full_content.push_str(&delta);
                    on_chunk(StreamChunk { delta, done: false });
                }
                SseLine::Done => break 'outer,
                SseLine::Skip => {}
            }
        }
    }

    on_chunk(StreamChunk {
        delta: String::new(),
        done: true,
    });
    Ok(full_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_delta_and_done() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Delta("Hel".into()));

        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Done);

        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: not json"), SseLine::Skip);
    }
}
