//! Shared application state, built once at startup and injected into every
//! handler. All provider adapters are constructed here so configuration
//! errors surface before the server binds.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::chat::ChatService;
use crate::core::config::Settings;
use crate::core::errors::ApiError;
use crate::embedding;
use crate::history::HistoryStore;
use crate::llm;
use crate::retrieval::RetrievalService;
use crate::vectorstore::{QdrantStore, VectorStore};

pub struct AppState {
    pub settings: Settings,
    pub chat: ChatService,
    pub history: HistoryStore,
    pub vector_store: Arc<dyn VectorStore>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl AppState {
    pub async fn initialize(settings: Settings) -> Result<Arc<Self>, ApiError> {
        let embedder = embedding::from_settings(&settings)?;
        let vector_store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(
            settings.qdrant_url.clone(),
            settings.qdrant_api_key.clone(),
            settings.qdrant_collection.clone(),
        ));
        vector_store
            .ensure_collection(settings.embedding_dimension)
            .await?;

        let llm = llm::from_settings(&settings)?;
        let history = HistoryStore::new(&settings.database_url).await?;
        let retrieval = Arc::new(RetrievalService::new(
            embedder,
            vector_store.clone(),
            settings.relevance_threshold,
        ));
        let chat = ChatService::new(
            retrieval,
            llm,
            history.clone(),
            settings.max_response_length,
        );
        let rate_limiter = RateLimiter::direct(chat_quota(&settings));

        Ok(Arc::new(Self {
            settings,
            chat,
            history,
            vector_store,
            rate_limiter,
        }))
    }

    /// Process-wide limiter applied to the chat routes.
    pub fn check_rate_limit(&self) -> Result<(), ApiError> {
        self.rate_limiter.check().map_err(|_| ApiError::RateLimited)
    }
}

fn chat_quota(settings: &Settings) -> Quota {
    let burst =
        NonZeroU32::new(settings.rate_limit_requests.max(1)).unwrap_or(NonZeroU32::MIN);
    let period =
        Duration::from_secs(settings.rate_limit_window_secs.max(1)) / burst.get();
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
        .allow_burst(burst)
}
