//! Retrieval pipeline: query (plus optional selected text) to a ranked,
//! relevance-filtered set of context chunks.

use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::embedding::EmbeddingProvider;
use crate::vectorstore::{TextbookChunk, VectorStore};

pub const TOP_K: usize = 5;

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    /// Minimum cosine similarity for a scored chunk to survive filtering.
    /// The main recall/precision tunable of the whole pipeline.
    relevance_threshold: f32,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        relevance_threshold: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            relevance_threshold,
        }
    }

    /// Retrieve relevant chunks for the query, still in descending score
    /// order; possibly empty.
    pub async fn retrieve(
        &self,
        query: &str,
        selected_text: Option<&str>,
    ) -> Result<Vec<TextbookChunk>, ApiError> {
        let search_text = match selected_text {
            Some(selected) => format!("{} Context: {}", query, selected),
            None => query.to_string(),
        };

        let query_vector = self.embedder.embed_one(&search_text).await?;
        let chunks = self.store.search(&query_vector, TOP_K).await?;

        let total = chunks.len();
        let filtered: Vec<TextbookChunk> = chunks
            .into_iter()
            // Chunks the store did not score are kept by default.
            .filter(|chunk| match chunk.score {
                Some(score) => score >= self.relevance_threshold,
                None => true,
            })
            .collect();

        tracing::debug!(
            query = %query,
            retrieved = total,
            kept = filtered.len(),
            threshold = self.relevance_threshold,
            "retrieval complete"
        );

        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FixedEmbedder {
        last_input: Mutex<Option<String>>,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            if let Some(first) = texts.first() {
                *self.last_input.lock().unwrap() = Some(first.clone());
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    struct CannedStore {
        chunks: Vec<TextbookChunk>,
    }

    #[async_trait]
    impl VectorStore for CannedStore {
        async fn ensure_collection(&self, _dimension: usize) -> Result<(), ApiError> {
            Ok(())
        }
        async fn recreate_collection(&self, _dimension: usize) -> Result<(), ApiError> {
            Ok(())
        }
        async fn upsert(&self, _points: Vec<(TextbookChunk, Vec<f32>)>) -> Result<(), ApiError> {
            Ok(())
        }
        async fn search(
            &self,
            _query_vector: &[f32],
            top_k: usize,
        ) -> Result<Vec<TextbookChunk>, ApiError> {
            Ok(self.chunks.iter().take(top_k).cloned().collect())
        }
        async fn health(&self) -> bool {
            true
        }
    }

    fn chunk(id: &str, score: Option<f32>) -> TextbookChunk {
        TextbookChunk {
            id: id.into(),
            content: format!("content of {}", id),
            title: format!("title of {}", id),
            chapter: "Chapter 1".into(),
            section: "Section".into(),
            url: format!("/docs/{}", id),
            source_file: "doc.md".into(),
            position: 0,
            metadata: serde_json::Value::Null,
            score,
        }
    }

    fn service(chunks: Vec<TextbookChunk>) -> (RetrievalService, Arc<FixedEmbedder>) {
        let embedder = Arc::new(FixedEmbedder {
            last_input: Mutex::new(None),
        });
        let store = Arc::new(CannedStore { chunks });
        (
            RetrievalService::new(embedder.clone(), store, 0.3),
            embedder,
        )
    }

    #[tokio::test]
    async fn scores_below_threshold_are_dropped() {
        let (service, _) = service(vec![
            chunk("a", Some(0.9)),
            chunk("b", Some(0.31)),
            chunk("c", Some(0.29)),
            chunk("d", Some(0.05)),
        ]);

        let result = service.retrieve("what is kinematics", None).await.unwrap();
        let ids: Vec<&str> = result.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unscored_chunks_are_kept() {
        let (service, _) = service(vec![chunk("a", None), chunk("b", Some(0.1))]);
        let result = service.retrieve("query", None).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "a");
    }

    #[tokio::test]
    async fn search_is_capped_at_top_k() {
        let many: Vec<TextbookChunk> = (0..10)
            .map(|i| chunk(&format!("c{}", i), Some(0.9)))
            .collect();
        let (service, _) = service(many);
        let result = service.retrieve("query", None).await.unwrap();
        assert_eq!(result.len(), TOP_K);
    }

    #[tokio::test]
    async fn selected_text_is_appended_to_the_search_string() {
        let (service, embedder) = service(vec![]);
        service
            .retrieve("what is a node", Some("A ROS 2 node is a process"))
            .await
            .unwrap();

        let seen = embedder.last_input.lock().unwrap().clone().unwrap();
        assert_eq!(seen, "what is a node Context: A ROS 2 node is a process");
    }
}
