use crate::config::{ChatProviderKind, Config, VectorBackend};

/// Show the first and last four characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    }
}

fn secret(value: &Option<String>) -> String {
    value.as_deref().map(mask_secret).unwrap_or_else(|| "(unset)".into())
}

fn plain(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(unset)".into())
}

/// Effective settings as `(key, value)` rows with API keys masked.
pub fn settings_view(config: &Config) -> Vec<(&'static str, String)> {
    let provider = match config.chat_provider {
        ChatProviderKind::OpenAi => "openai",
        ChatProviderKind::Claude => "claude",
        ChatProviderKind::Ollama => "ollama",
    };
    let backend = match config.vector_backend {
        VectorBackend::Pinecone => "pinecone",
        VectorBackend::Sqlite => "sqlite",
    };

    vec![
        ("OPENAI_API_KEY", secret(&config.openai_api_key)),
        ("OPENAI_BASE_URL", config.openai_base_url.clone()),
        ("ANTHROPIC_API_KEY", secret(&config.anthropic_api_key)),
        ("ANTHROPIC_BASE_URL", config.anthropic_base_url.clone()),
        ("OLLAMA_HOST", config.ollama_host.clone()),
        ("CHAT_PROVIDER", provider.to_string()),
        ("CHAT_MODEL", config.chat_model.clone()),
        ("EMBEDDING_MODEL", config.embedding_model.clone()),
        ("VECTOR_BACKEND", backend.to_string()),
        ("PINECONE_API_KEY", secret(&config.pinecone.api_key)),
        ("PINECONE_INDEX_NAME", plain(&config.pinecone.index_name)),
        ("PINECONE_INDEX_HOST", plain(&config.pinecone.index_host)),
        ("LLAMA_API_KEY", secret(&config.llama_api_key)),
        ("UPLOAD_FOLDER", config.upload_folder.display().to_string()),
        ("DATABASE_PATH", config.database_path.display().to_string()),
        ("CHUNK_SIZE", config.chunk_size.to_string()),
        ("CHUNK_OVERLAP", config.chunk_overlap.to_string()),
        ("TOP_K", config.top_k.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-abcdefghijkl1234"), "sk-a...1234");
        assert_eq!(mask_secret("short"), "****");
    }

    #[test]
    fn test_view_masks_keys_only() {
        let config = Config::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-live-abcdefgh9876".into()),
            "PINECONE_INDEX_NAME" => Some("docs".into()),
            _ => None,
        })
        .unwrap();
        let view = settings_view(&config);
        let get = |key: &str| view.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone()).unwrap();

        assert_eq!(get("OPENAI_API_KEY"), "sk-l...9876");
        assert_eq!(get("ANTHROPIC_API_KEY"), "(unset)");
        assert_eq!(get("PINECONE_INDEX_NAME"), "docs");
        assert_eq!(get("VECTOR_BACKEND"), "pinecone");
        assert_eq!(get("TOP_K"), "5");
        assert!(view.iter().all(|(_, v)| !v.contains("abcdefgh")));
    }
}
