pub mod chat;
pub mod core;
pub mod embedding;
pub mod history;
pub mod ingest;
pub mod llm;
pub mod retrieval;
pub mod server;
pub mod state;
pub mod vectorstore;
