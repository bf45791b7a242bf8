//! Environment-sourced application settings.
//!
//! Every recognized key has a default matching a local development setup;
//! provider API keys are only required once the matching provider is
//! actually selected, so construction never fails on missing credentials
//! for providers that are not in use.

use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    // Provider selectors
    pub embedding_provider: String,
    pub llm_provider: String,

    // OpenAI
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_embedding_model: String,

    // Cohere
    pub cohere_api_key: String,
    pub cohere_model: String,
    pub cohere_embedding_model: String,

    // Ollama (self-hosted)
    pub ollama_url: String,
    pub ollama_model: String,
    pub ollama_embedding_model: String,

    // LM Studio (local models over an OpenAI-compatible endpoint)
    pub lmstudio_url: String,
    pub lmstudio_embedding_model: String,

    // Qdrant
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
    pub embedding_dimension: usize,

    // Relational store
    pub database_url: String,

    // Application limits
    pub max_query_length: usize,
    pub max_response_length: u32,
    pub chunk_size: usize,
    pub overlap_size: usize,
    pub relevance_threshold: f32,

    // Rate limiting
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,

    pub port: u16,
    pub log_dir: String,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            embedding_provider: var_or("EMBEDDING_PROVIDER", "cohere"),
            llm_provider: var_or("LLM_PROVIDER", "cohere"),

            openai_api_key: var_or("OPENAI_API_KEY", ""),
            openai_model: var_or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_embedding_model: var_or("EMBEDDING_MODEL", "text-embedding-3-small"),

            cohere_api_key: var_or("COHERE_API_KEY", ""),
            cohere_model: var_or("COHERE_MODEL", "command-r"),
            cohere_embedding_model: var_or("COHERE_EMBEDDING_MODEL", "embed-english-v3.0"),

            ollama_url: var_or("OLLAMA_URL", "http://localhost:11434"),
            ollama_model: var_or("OLLAMA_MODEL", "llama3"),
            ollama_embedding_model: var_or("OLLAMA_EMBEDDING_MODEL", "nomic-embed-text"),

            lmstudio_url: var_or("LMSTUDIO_URL", "http://localhost:1234"),
            lmstudio_embedding_model: var_or("LMSTUDIO_EMBEDDING_MODEL", "all-MiniLM-L6-v2"),

            qdrant_url: var_or("QDRANT_URL", "http://localhost:6333"),
            qdrant_api_key: env::var("QDRANT_API_KEY").ok().filter(|v| !v.is_empty()),
            qdrant_collection: var_or("QDRANT_COLLECTION_NAME", "textbook_chunks"),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 1024),

            database_url: var_or("DATABASE_URL", "sqlite://chatbot.db?mode=rwc"),

            max_query_length: parse_or("MAX_QUERY_LENGTH", 1000),
            max_response_length: parse_or("MAX_RESPONSE_LENGTH", 2000),
            chunk_size: parse_or("CHUNK_SIZE", 1000),
            overlap_size: parse_or("OVERLAP_SIZE", 100),
            relevance_threshold: parse_or("RELEVANCE_THRESHOLD", 0.3),

            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 10),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),

            port: parse_or("PORT", 8000),
            log_dir: var_or("LOG_DIR", "logs"),
        }
    }
}
