use anyhow::Context;
use std::sync::Arc;

use crate::config::Config;
use crate::llm::embeddings::{Embedder, HuggingFaceEmbedder};
use crate::search::vector::{MemoryRowStore, VectorStore};
use crate::source::{FileSource, GitHubSource, LocalSource};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: VectorStore,
    pub embedder: Arc<dyn Embedder>,
    pub source: Arc<dyn FileSource>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.vector_dir())?;

        let rows = MemoryRowStore::open_or_create(&config.vector_dir(), config.store.max_rows)
            .context("Failed to open vector store")?;
        let store = VectorStore::new(Arc::new(rows), &config.store);

        // Shared by the embedder and the GitHub source
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let embedder = HuggingFaceEmbedder::new(http_client.clone(), &config.embedding)
            .context("Hugging Face API key not configured")?;

        let source: Arc<dyn FileSource> = match &config.local_root {
            Some(root) => {
                tracing::info!("Serving repositories from {}", root.display());
                Arc::new(LocalSource::new(root, config.github.max_file_chars))
            }
            None => Arc::new(GitHubSource::new(
                http_client.clone(),
                config.github.clone(),
            )),
        };

        Ok(Self::with_parts(config, store, Arc::new(embedder), source))
    }

    /// Assemble state from already-built parts.
    pub fn with_parts(
        config: Config,
        store: VectorStore,
        embedder: Arc<dyn Embedder>,
        source: Arc<dyn FileSource>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            source,
        }
    }
}
