use super::AppContext;
use crate::error::Result;
use crate::llm::ChatClient;
use crate::qa::{Answer, Answerer};

/// Answer `question` from the documents uploaded to the conversation.
///
/// With `on_delta` set the answer is streamed through it as it is generated.
pub async fn ask(
    ctx: &AppContext,
    name: &str,
    question: &str,
    on_delta: Option<&(dyn for<'s> Fn(&'s str) + Send + Sync)>,
) -> Result<Answer> {
    let conversation = ctx.conversation(name)?;
    let embedder = ctx.embedder()?;
    let index = ctx.vector_index().await?;
    let model = ChatClient::from_config(ctx.client.clone(), &ctx.config)?;
    let answerer = Answerer::new(&embedder, index.as_ref(), &model).with_top_k(ctx.config.top_k);

    tracing::info!(conversation = %conversation.name, "answering question");
    match on_delta {
        Some(on_delta) => {
            answerer
                .ask_stream(question, Some(&conversation.name), on_delta)
                .await
        }
        None => answerer.ask(question, Some(&conversation.name)).await,
    }
}
