use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the vector store persists its rows
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Remote embedding model configuration
    pub embedding: EmbeddingConfig,
    /// Pacing for batch embedding
    pub batch: BatchConfig,
    /// GitHub file source configuration
    pub github: GitHubConfig,
    /// Repository processing limits
    pub ingest: IngestConfig,
    /// Vector store configuration
    pub store: StoreConfig,
    /// When set, repositories are read from `<local_root>/<owner>/<repo>`
    /// instead of the GitHub API.
    pub local_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Inference API root, e.g. "https://api-inference.huggingface.co"
    pub base_url: String,
    /// Model path appended as `/models/<model>`
    pub model: String,
    /// Bearer token; required to build a client
    pub api_key: Option<String>,
    /// Inputs are cut to this many characters before sending
    pub max_input_chars: usize,
    /// Wait before the single retry after a "model loading" (503) response
    pub model_loading_retry_ms: u64,
}

/// Concurrency window and pacing used by batch embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Item `i` of a batch starts `i * stagger_ms` after the batch
    pub stagger_ms: u64,
    /// Pause between consecutive batches
    pub inter_batch_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub api_base: String,
    pub token: Option<String>,
    /// Per-download timeout in seconds
    pub download_timeout_secs: u64,
    /// Downloads longer than this are treated as unavailable
    pub max_file_chars: usize,
    /// Directory listings fetched concurrently per window
    pub listing_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub max_files: usize,
    pub fetch_concurrency: usize,
    pub min_file_chars: usize,
    pub max_file_chars: usize,
    /// Token budget handed to the chunker
    pub chunk_max_tokens: usize,
    pub max_chunks_per_file: usize,
    pub max_chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Rows per append request
    pub insert_batch_size: usize,
    /// Maximum total rows held by the store (0 = unlimited)
    pub max_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            embedding: EmbeddingConfig::default(),
            batch: BatchConfig::default(),
            github: GitHubConfig::default(),
            ingest: IngestConfig::default(),
            store: StoreConfig::default(),
            local_root: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".to_string(),
            model: "BAAI/bge-small-en-v1.5".to_string(),
            api_key: None,
            max_input_chars: 8192,
            model_loading_retry_ms: 10_000,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            stagger_ms: 200,
            inter_batch_delay_ms: 1_000,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            download_timeout_secs: 10,
            max_file_chars: 100_000,
            listing_concurrency: 3,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_files: 100,
            fetch_concurrency: 5,
            min_file_chars: 50,
            max_file_chars: 50_000,
            chunk_max_tokens: 300,
            max_chunks_per_file: 20,
            max_chunks: 500,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            insert_batch_size: 50,
            max_rows: 0,
        }
    }
}

impl EmbeddingConfig {
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model)
    }

    pub fn model_loading_retry(&self) -> Duration {
        Duration::from_millis(self.model_loading_retry_ms)
    }
}

impl BatchConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        if let Ok(v) = val.parse() {
            *target = v;
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DEVINSIGHT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("DEVINSIGHT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(root) = std::env::var("DEVINSIGHT_LOCAL_ROOT") {
            config.local_root = Some(PathBuf::from(root));
        }

        // Embedding model
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("HUGGINGFACE_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        env_parse("EMBEDDING_MAX_INPUT_CHARS", &mut config.embedding.max_input_chars);
        env_parse(
            "EMBEDDING_RETRY_DELAY_MS",
            &mut config.embedding.model_loading_retry_ms,
        );
        env_parse("EMBEDDING_BATCH_SIZE", &mut config.batch.batch_size);
        env_parse("EMBEDDING_STAGGER_MS", &mut config.batch.stagger_ms);
        env_parse(
            "EMBEDDING_INTER_BATCH_DELAY_MS",
            &mut config.batch.inter_batch_delay_ms,
        );
        // A zero batch would never make progress
        config.batch.batch_size = config.batch.batch_size.max(1);

        // GitHub
        if let Ok(base) = std::env::var("GITHUB_API_BASE") {
            config.github.api_base = base;
        }
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            config.github.token = Some(token);
        }
        env_parse(
            "GITHUB_DOWNLOAD_TIMEOUT_SECS",
            &mut config.github.download_timeout_secs,
        );

        // Ingestion limits
        env_parse("DEVINSIGHT_MAX_FILES", &mut config.ingest.max_files);
        env_parse("DEVINSIGHT_MAX_CHUNKS", &mut config.ingest.max_chunks);
        env_parse("DEVINSIGHT_CHUNK_MAX_TOKENS", &mut config.ingest.chunk_max_tokens);

        // Store
        env_parse("DEVINSIGHT_MAX_ROWS", &mut config.store.max_rows);

        config
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }
}
