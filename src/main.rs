use anyhow::Context;
use tokio::net::TcpListener;

use textbook_rag_backend::core::{config::Settings, logging};
use textbook_rag_backend::server;
use textbook_rag_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env();
    logging::init(&settings.log_dir);

    let bind_addr = format!("0.0.0.0:{}", settings.port);
    let state = AppState::initialize(settings)
        .await
        .context("Failed to initialize application state")?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let app = server::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
