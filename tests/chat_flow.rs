//! End-to-end orchestration through `ChatService` with in-process provider
//! implementations: a deterministic bag-of-words embedder, an in-memory
//! cosine store, and a scripted model.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use textbook_rag_backend::chat::ChatService;
use textbook_rag_backend::core::errors::ApiError;
use textbook_rag_backend::embedding::EmbeddingProvider;
use textbook_rag_backend::history::HistoryStore;
use textbook_rag_backend::llm::{GenerationRequest, LlmProvider};
use textbook_rag_backend::retrieval::RetrievalService;
use textbook_rag_backend::vectorstore::{TextbookChunk, VectorStore};

const DIM: usize = 32;

/// Assigns each distinct word its own dimension, so cosine similarity is
/// exactly the word-overlap ratio. Deterministic and collision-free for
/// small test vocabularies.
#[derive(Debug)]
struct BagOfWords {
    vocabulary: Mutex<HashMap<String, usize>>,
}

impl BagOfWords {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            vocabulary: Mutex::new(HashMap::new()),
        })
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIM];
        let mut vocabulary = self.vocabulary.lock().unwrap();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let next = vocabulary.len() % DIM;
            let index = *vocabulary.entry(word).or_insert(next);
            vector[index] = 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWords {
    fn name(&self) -> &str {
        "bag-of-words"
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

#[derive(Default)]
struct InMemoryStore {
    points: Mutex<Vec<(TextbookChunk, Vec<f32>)>>,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, _dimension: usize) -> Result<(), ApiError> {
        Ok(())
    }
    async fn recreate_collection(&self, _dimension: usize) -> Result<(), ApiError> {
        self.points.lock().unwrap().clear();
        Ok(())
    }
    async fn upsert(&self, points: Vec<(TextbookChunk, Vec<f32>)>) -> Result<(), ApiError> {
        let mut stored = self.points.lock().unwrap();
        for (chunk, vector) in points {
            stored.retain(|(existing, _)| existing.id != chunk.id);
            stored.push((chunk, vector));
        }
        Ok(())
    }
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<TextbookChunk>, ApiError> {
        let stored = self.points.lock().unwrap();
        let mut hits: Vec<TextbookChunk> = stored
            .iter()
            .map(|(chunk, vector)| {
                let mut hit = chunk.clone();
                hit.score = Some(cosine(query_vector, vector));
                hit
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
    async fn health(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct ScriptedLlm {
    answer: String,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedLlm {
    fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            last_request: Mutex::new(None),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }
    async fn generate(&self, request: GenerationRequest) -> Result<String, ApiError> {
        *self.last_request.lock().unwrap() = Some(request);
        Ok(self.answer.clone())
    }
    async fn stream_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        *self.last_request.lock().unwrap() = Some(request);
        let (tx, rx) = mpsc::channel(32);
        let answer = self.answer.clone();
        tokio::spawn(async move {
            for word in answer.split_inclusive(' ') {
                if tx.send(Ok(word.to_string())).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

fn kinematics_chunk() -> TextbookChunk {
    TextbookChunk {
        id: "kinematics-0".into(),
        content: "Kinematics describes motion...".into(),
        title: "Kinematics".into(),
        chapter: "Chapter 3".into(),
        section: "Motion".into(),
        url: "/docs/kinematics".into(),
        source_file: "module-1/kinematics.md".into(),
        position: 0,
        metadata: serde_json::Value::Null,
        score: None,
    }
}

async fn build_service(
    answer: &str,
) -> (tempfile::TempDir, ChatService, Arc<ScriptedLlm>, Arc<InMemoryStore>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("flow.db").to_string_lossy()
    );
    let history = HistoryStore::new(&url).await.expect("history store");

    let embedder = BagOfWords::new();
    let store = Arc::new(InMemoryStore::default());

    // Ingest the one textbook chunk the way the bulk loader would.
    let chunk = kinematics_chunk();
    let vector = embedder.embed_one(&chunk.content).await.unwrap();
    store.upsert(vec![(chunk, vector)]).await.unwrap();

    let retrieval = Arc::new(RetrievalService::new(embedder, store.clone(), 0.3));
    let llm = ScriptedLlm::new(answer);
    let service = ChatService::new(retrieval, llm.clone(), history, 2000);
    (dir, service, llm, store)
}

#[tokio::test]
async fn matching_query_retrieves_and_cites_the_chunk() {
    let (_dir, service, llm, _) =
        build_service("Kinematics is the study of motion without forces.").await;

    let response = service
        .process_query("what is kinematics", None, None)
        .await
        .unwrap();

    assert_eq!(
        response.response,
        "Kinematics is the study of motion without forces."
    );
    assert_eq!(response.citations.len(), 1);
    assert_eq!(response.citations[0].title, "Kinematics");
    assert_eq!(response.citations[0].url, "/docs/kinematics");
    assert_eq!(response.sources, vec!["kinematics-0"]);

    let request = llm.last_request.lock().unwrap().clone().unwrap();
    assert!(request.system_prompt.contains("Kinematics describes motion"));
}

#[tokio::test]
async fn unrelated_query_falls_back_without_citations() {
    let (_dir, service, _, _) = build_service("unused").await;

    let response = service
        .process_query("underwater basket weaving", None, None)
        .await
        .unwrap();

    assert!(response.response.contains("underwater basket weaving"));
    assert!(response.citations.is_empty());
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn conversation_accumulates_ordered_turns() {
    let (_dir, service, _, _) = build_service("An answer about kinematics.").await;

    let first = service
        .process_query("what is kinematics", None, None)
        .await
        .unwrap();
    service
        .process_query("tell me more about kinematics", Some(&first.conversation_id), None)
        .await
        .unwrap();

    let messages = service
        .conversation_history(&first.conversation_id)
        .await
        .unwrap();
    let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
    assert_eq!(messages[0].content, "what is kinematics");
}

#[tokio::test]
async fn streaming_persists_the_full_concatenation() {
    let (_dir, service, _, _) = build_service("Kinematics is motion described.").await;

    let (conversation_id, mut rx) = service
        .stream_response("what is kinematics", None, None)
        .await
        .unwrap();

    let mut received = String::new();
    while let Some(item) = rx.recv().await {
        received.push_str(&item.unwrap());
    }
    assert_eq!(received, "Kinematics is motion described.");

    let mut messages = vec![];
    for _ in 0..50 {
        messages = service.conversation_history(&conversation_id).await.unwrap();
        if messages.len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(messages[1].content, "Kinematics is motion described.");
    assert_eq!(messages[1].source_chunks, vec!["kinematics-0"]);
}
