//! Offline bulk ingestion: parse a docs tree, chunk it, embed it and load
//! the vector collection from scratch.
//!
//! Destructive by design: the collection is recreated on every run, so the
//! loaded points always mirror the docs directory exactly.

use std::path::{Path, PathBuf};

use anyhow::Context;

use textbook_rag_backend::core::{config::Settings, logging};
use textbook_rag_backend::embedding;
use textbook_rag_backend::ingest::{parse_document_file, TextSplitter};
use textbook_rag_backend::vectorstore::{QdrantStore, TextbookChunk, VectorStore};

const EMBED_BATCH: usize = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env();
    logging::init(&settings.log_dir);

    let docs_dir = std::env::var("DOCS_DIR").unwrap_or_else(|_| "docs".to_string());
    let root = PathBuf::from(&docs_dir);
    if !root.is_dir() {
        anyhow::bail!("DOCS_DIR {} is not a directory", docs_dir);
    }

    let embedder = embedding::from_settings(&settings)
        .context("Failed to construct embedding provider")?;
    let store = QdrantStore::new(
        settings.qdrant_url.clone(),
        settings.qdrant_api_key.clone(),
        settings.qdrant_collection.clone(),
    );
    store
        .recreate_collection(settings.embedding_dimension)
        .await
        .context("Failed to recreate vector collection")?;

    let splitter = TextSplitter::new(settings.chunk_size, settings.overlap_size);

    let mut files = Vec::new();
    collect_documents(&root, &mut files).context("Failed to walk docs directory")?;
    files.sort();
    tracing::info!("Found {} documents under {}", files.len(), docs_dir);

    let mut chunks: Vec<TextbookChunk> = Vec::new();
    for path in &files {
        match document_chunks(&root, path, &splitter) {
            Ok(doc_chunks) => {
                tracing::info!(
                    "Parsed {} into {} chunks",
                    path.display(),
                    doc_chunks.len()
                );
                chunks.extend(doc_chunks);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
            }
        }
    }

    let total = chunks.len();
    for batch in chunks.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .await
            .context("Embedding batch failed")?;
        let points: Vec<(TextbookChunk, Vec<f32>)> =
            batch.iter().cloned().zip(vectors).collect();
        store.upsert(points).await.context("Upsert failed")?;
    }

    tracing::info!("Ingested {} chunks into {}", total, store.collection());
    Ok(())
}

fn collect_documents(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_documents(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("mdx")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

fn document_chunks(
    root: &Path,
    path: &Path,
    splitter: &TextSplitter,
) -> anyhow::Result<Vec<TextbookChunk>> {
    let doc = parse_document_file(path)?;

    let relative = path.strip_prefix(root).unwrap_or(path);
    let doc_id = doc
        .metadata
        .get("id")
        .cloned()
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "document".to_string());
    let url = doc_url(relative, &doc_id);
    let chapter = chapter_for(relative);
    let metadata = serde_json::to_value(&doc.metadata)?;

    let mut chunks = Vec::new();
    let mut position = 0;
    for section in &doc.sections {
        for piece in splitter.split(&section.content) {
            chunks.push(TextbookChunk {
                id: uuid::Uuid::new_v4().to_string(),
                content: piece,
                title: doc.title.clone(),
                chapter: chapter.clone(),
                section: section.title.clone(),
                url: url.clone(),
                source_file: relative.to_string_lossy().to_string(),
                position,
                metadata: metadata.clone(),
                score: None,
            });
            position += 1;
        }
    }
    Ok(chunks)
}

fn doc_url(relative: &Path, doc_id: &str) -> String {
    match relative.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => format!("/docs/{}/{}", dir.to_string_lossy().replace('\\', "/"), doc_id),
        None => format!("/docs/{}", doc_id),
    }
}

/// Chapter is the enclosing `module*` directory, if any.
fn chapter_for(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .find(|name| name.starts_with("module"))
        .map(str::to_string)
        .unwrap_or_else(|| "General".to_string())
}
