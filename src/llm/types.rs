use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// A fully-assembled generation request: the context-bearing system prompt,
/// recent conversation history, and the user's query. Providers translate
/// this into their own wire format and role vocabulary.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub query: String,
    pub max_tokens: Option<u32>,
}
