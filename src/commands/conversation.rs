use super::AppContext;
use crate::conversation::{conversation_folder, generate_conversation_id, list_uploaded_files};
use crate::db::models::Conversation;
use crate::error::Result;

pub fn create_conversation(ctx: &AppContext) -> Result<Conversation> {
    let conversation = ctx.db.create_conversation(&generate_conversation_id())?;
    tracing::info!(name = %conversation.name, "created conversation");
    Ok(conversation)
}

pub fn list_conversations(ctx: &AppContext) -> Result<Vec<Conversation>> {
    ctx.db.list_conversations()
}

/// Names of the files uploaded into a conversation.
pub fn list_files(ctx: &AppContext, name: &str) -> Result<Vec<String>> {
    let conversation = ctx.conversation(name)?;
    list_uploaded_files(&conversation_folder(&ctx.config.upload_folder, &conversation.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::local_context;
    use crate::error::DocQaError;

    #[test]
    fn test_create_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = local_context("http://127.0.0.1:9", dir.path());

        let first = create_conversation(&ctx).unwrap();
        let second = create_conversation(&ctx).unwrap();
        assert_ne!(first.name, second.name);

        let listed = list_conversations(&ctx).unwrap();
        assert_eq!(listed, vec![second.clone(), first]);
        assert!(list_files(&ctx, &second.name).unwrap().is_empty());
        assert!(matches!(
            list_files(&ctx, "nope"),
            Err(DocQaError::UnknownConversation(_))
        ));
    }
}
