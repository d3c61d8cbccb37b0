//! Repository ingestion: list, fetch, chunk, embed, store.

use anyhow::{bail, Context, Result};
use futures_util::future::join_all;

use crate::chunking::chunk_file;
use crate::config::{BatchConfig, IngestConfig};
use crate::llm::batch::embed_batch;
use crate::llm::embeddings::Embedder;
use crate::models::Fragment;
use crate::search::vector::VectorStore;
use crate::source::{FileSource, RemoteFile, RepoRef};

pub const NO_FILES_MESSAGE: &str = "No supported files found in repository";
pub const NO_CHUNKS_MESSAGE: &str = "No code chunks could be generated";

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Files that produced at least one fragment.
    pub processed_files: usize,
    /// Fragments embedded and stored.
    pub processed_chunks: usize,
    /// Set when the repository had nothing to index.
    pub message: Option<String>,
}

impl IngestReport {
    fn empty(message: &str) -> Self {
        Self {
            processed_files: 0,
            processed_chunks: 0,
            message: Some(message.to_string()),
        }
    }
}

/// Replace everything stored for `repo` with a fresh index of its files.
///
/// Existing rows are deleted first, so a run that fails midway leaves the
/// repository empty until the next successful run. A repository without
/// supported files is a successful empty run; files that yield no fragments,
/// no embeddings or a failed store write fail the whole run.
pub async fn ingest(
    source: &dyn FileSource,
    embedder: &dyn Embedder,
    store: &VectorStore,
    repo: &RepoRef,
    config: &IngestConfig,
    batch: &BatchConfig,
) -> Result<IngestReport> {
    let repo_id = repo.repo_id();

    store
        .delete_all(&repo_id)
        .await
        .with_context(|| format!("Failed to clear existing data for {repo_id}"))?;
    tracing::info!("Cleared existing data for {repo_id}");

    let files = source.list_files(repo).await?;
    if files.is_empty() {
        tracing::info!("{repo_id}: {NO_FILES_MESSAGE}");
        return Ok(IngestReport::empty(NO_FILES_MESSAGE));
    }

    if files.len() > config.max_files {
        tracing::info!(
            "Processing first {} of {} files",
            config.max_files,
            files.len()
        );
    }
    let files = &files[..files.len().min(config.max_files)];

    let mut fragments: Vec<Fragment> = Vec::new();
    let mut processed_files = 0usize;
    let window = config.fetch_concurrency.max(1);
    let total_windows = files.len().div_ceil(window);

    for (i, batch_files) in files.chunks(window).enumerate() {
        let results = join_all(
            batch_files
                .iter()
                .map(|file| fragments_for_file(source, file, config)),
        )
        .await;

        for file_fragments in results {
            if !file_fragments.is_empty() {
                processed_files += 1;
                fragments.extend(file_fragments);
            }
        }
        tracing::debug!("Processed file batch {}/{total_windows}", i + 1);
    }

    tracing::info!(
        "Generated {} chunks from {processed_files} files",
        fragments.len()
    );

    if fragments.is_empty() {
        bail!("{NO_CHUNKS_MESSAGE} from {} files", files.len());
    }

    fragments.truncate(config.max_chunks);

    let embedded = embed_batch(embedder, &fragments, batch)
        .await
        .context("Failed to generate embeddings")?;

    let stored = store
        .insert(&repo_id, &embedded)
        .await
        .context("Failed to store embeddings")?;

    tracing::info!("Indexed {repo_id}: {processed_files} files, {stored} chunks");
    Ok(IngestReport {
        processed_files,
        processed_chunks: stored,
        message: None,
    })
}

/// Download and chunk one file. Unavailable, tiny or oversized files yield
/// nothing.
async fn fragments_for_file(
    source: &dyn FileSource,
    file: &RemoteFile,
    config: &IngestConfig,
) -> Vec<Fragment> {
    let Some(content) = source.fetch(file).await else {
        return Vec::new();
    };

    let chars = content.chars().count();
    if chars < config.min_file_chars {
        return Vec::new();
    }
    if chars > config.max_file_chars {
        tracing::info!("Skipping large file: {} ({chars} chars)", file.path);
        return Vec::new();
    }

    let mut fragments = chunk_file(&content, &file.path, config.chunk_max_tokens);
    fragments.truncate(config.max_chunks_per_file);
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::llm::embeddings::EmbedError;
    use crate::models::RepositoryInfo;
    use crate::search::vector::MemoryRowStore;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct MapSource {
        files: BTreeMap<String, String>,
    }

    impl MapSource {
        fn new(files: &[(&str, String)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.clone()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl FileSource for MapSource {
        async fn describe(&self, _repo: &RepoRef) -> Result<RepositoryInfo> {
            unreachable!("ingest never describes")
        }

        async fn list_files(&self, _repo: &RepoRef) -> Result<Vec<RemoteFile>> {
            Ok(self
                .files
                .iter()
                .map(|(path, content)| RemoteFile {
                    path: path.clone(),
                    download_url: path.clone(),
                    size: content.len() as u64,
                })
                .collect())
        }

        async fn fetch(&self, file: &RemoteFile) -> Option<String> {
            self.files.get(&file.download_url).cloned()
        }
    }

    /// Two-dimensional vector from the input; fails for everything when `broken`.
    struct FakeEmbedder {
        broken: bool,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
            if self.broken {
                return Err(EmbedError::InvalidResponse);
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn repo() -> RepoRef {
        RepoRef {
            owner: "octo".into(),
            repo: "demo".into(),
        }
    }

    fn store() -> VectorStore {
        VectorStore::new(Arc::new(MemoryRowStore::in_memory(0)), &StoreConfig::default())
    }

    fn quick_batch() -> BatchConfig {
        BatchConfig {
            batch_size: 5,
            stagger_ms: 0,
            inter_batch_delay_ms: 0,
        }
    }

    fn js_function(name: &str) -> String {
        format!("function {name}(a, b) {{\n  return a + b; // adds the two arguments together\n}}\n")
    }

    #[tokio::test]
    async fn test_ingest_stores_fragments_and_skips_tiny_files() {
        let source = MapSource::new(&[
            ("src/math.js", js_function("add")),
            ("src/tiny.js", "x = 1".to_string()),
        ]);
        let store = store();

        let report = ingest(
            &source,
            &FakeEmbedder { broken: false },
            &store,
            &repo(),
            &IngestConfig::default(),
            &quick_batch(),
        )
        .await
        .unwrap();

        assert_eq!(report.processed_files, 1);
        assert_eq!(report.processed_chunks, 1);
        assert!(report.message.is_none());

        let stats = store.stats("octo/demo").await;
        assert_eq!(stats.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_fragments_per_file_are_capped() {
        let big: String = (0..40).map(|i| js_function(&format!("f{i}"))).collect();
        let source = MapSource::new(&[("lib/many.js", big)]);
        let config = IngestConfig {
            chunk_max_tokens: 10,
            max_chunks_per_file: 3,
            ..IngestConfig::default()
        };
        let store = store();

        let report = ingest(
            &source,
            &FakeEmbedder { broken: false },
            &store,
            &repo(),
            &config,
            &quick_batch(),
        )
        .await
        .unwrap();
        assert_eq!(report.processed_chunks, 3);
    }

    #[tokio::test]
    async fn test_max_files_and_max_chunks_limits() {
        let files: Vec<(String, String)> = (0..6)
            .map(|i| (format!("f{i}.js"), js_function(&format!("g{i}"))))
            .collect();
        let refs: Vec<(&str, String)> = files.iter().map(|(p, c)| (p.as_str(), c.clone())).collect();
        let source = MapSource::new(&refs);

        let config = IngestConfig {
            max_files: 4,
            fetch_concurrency: 2,
            max_chunks: 3,
            ..IngestConfig::default()
        };
        let report = ingest(
            &source,
            &FakeEmbedder { broken: false },
            &store(),
            &repo(),
            &config,
            &quick_batch(),
        )
        .await
        .unwrap();
        assert_eq!(report.processed_files, 4);
        assert_eq!(report.processed_chunks, 3);
    }

    #[tokio::test]
    async fn test_empty_repository_reports_message() {
        let source = MapSource::new(&[]);
        let report = ingest(
            &source,
            &FakeEmbedder { broken: false },
            &store(),
            &repo(),
            &IngestConfig::default(),
            &quick_batch(),
        )
        .await
        .unwrap();
        assert_eq!(report, IngestReport::empty(NO_FILES_MESSAGE));
    }

    #[tokio::test]
    async fn test_no_fragments_is_an_error() {
        let source = MapSource::new(&[("a.js", "let a;".to_string())]);
        let err = ingest(
            &source,
            &FakeEmbedder { broken: false },
            &store(),
            &repo(),
            &IngestConfig::default(),
            &quick_batch(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains(NO_CHUNKS_MESSAGE));
    }

    #[tokio::test]
    async fn test_total_embedding_failure_is_an_error() {
        let source = MapSource::new(&[("src/math.js", js_function("add"))]);
        let err = ingest(
            &source,
            &FakeEmbedder { broken: true },
            &store(),
            &repo(),
            &IngestConfig::default(),
            &quick_batch(),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to generate embeddings"));
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_rows() {
        let store = store();
        let embedder = FakeEmbedder { broken: false };
        let first = MapSource::new(&[
            ("a.js", js_function("a")),
            ("b.js", js_function("b")),
        ]);
        ingest(&first, &embedder, &store, &repo(), &IngestConfig::default(), &quick_batch())
            .await
            .unwrap();
        assert_eq!(store.stats("octo/demo").await.chunk_count, 2);

        let second = MapSource::new(&[("a.js", js_function("a"))]);
        ingest(&second, &embedder, &store, &repo(), &IngestConfig::default(), &quick_batch())
            .await
            .unwrap();
        assert_eq!(store.stats("octo/demo").await.chunk_count, 1);
    }
}
