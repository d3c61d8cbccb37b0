use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::models::{EmbeddedFragment, QueryHit, RepoStats, StoredFragment};
use crate::search::similarity::{distance, rank_by_distance};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("vector store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("vector store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("vector store is full: {limit} rows")]
    CapacityExceeded { limit: usize },
    #[error("vector store backend error: {0}")]
    Backend(String),
}

/// Key/value + scan backend partitioned by repository id.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Append rows. Either all rows of the call are written or none are.
    async fn append(&self, rows: Vec<StoredFragment>) -> Result<(), StoreError>;

    /// Every row of one repository, in insertion order.
    async fn scan(&self, repo_id: &str) -> Result<Vec<StoredFragment>, StoreError>;

    /// Remove every row of one repository; returns how many were removed.
    async fn remove(&self, repo_id: &str) -> Result<usize, StoreError>;

    /// Number of rows stored for one repository.
    async fn count(&self, repo_id: &str) -> Result<usize, StoreError>;
}

/// In-memory rows with optional JSON persistence.
pub struct MemoryRowStore {
    rows: RwLock<Vec<StoredFragment>>,
    persist_path: Option<PathBuf>,
    /// 0 = unlimited
    max_rows: usize,
}

impl MemoryRowStore {
    pub fn in_memory(max_rows: usize) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            persist_path: None,
            max_rows,
        }
    }

    /// Load `vectors.json` from `vector_dir`, creating the directory if needed.
    ///
    /// An unreadable file is renamed to `vectors.json.corrupt` and the store
    /// starts empty.
    pub fn open_or_create(vector_dir: &Path, max_rows: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("vectors.json");

        let rows = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)?;
            match serde_json::from_str(&data) {
                Ok(rows) => rows,
                Err(e) => {
                    let corrupt_path = persist_path.with_extension("json.corrupt");
                    tracing::warn!(
                        "Unreadable vector store {}: {e}; moving it to {}",
                        persist_path.display(),
                        corrupt_path.display()
                    );
                    std::fs::rename(&persist_path, &corrupt_path)?;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            rows: RwLock::new(rows),
            persist_path: Some(persist_path),
            max_rows,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    /// Atomic write via temp file + rename.
    fn persist(&self, rows: &[StoredFragment]) -> Result<(), StoreError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = serde_json::to_string(rows)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn append(&self, new_rows: Vec<StoredFragment>) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        if self.max_rows > 0 && rows.len() + new_rows.len() > self.max_rows {
            return Err(StoreError::CapacityExceeded {
                limit: self.max_rows,
            });
        }

        let before = rows.len();
        rows.extend(new_rows);
        if let Err(e) = self.persist(&rows) {
            rows.truncate(before);
            return Err(e);
        }
        Ok(())
    }

    async fn scan(&self, repo_id: &str) -> Result<Vec<StoredFragment>, StoreError> {
        let rows = self.rows.read();
        Ok(rows.iter().filter(|r| r.repo_id == repo_id).cloned().collect())
    }

    async fn remove(&self, repo_id: &str) -> Result<usize, StoreError> {
        let mut rows = self.rows.write();
        let retained: Vec<StoredFragment> = rows
            .iter()
            .filter(|r| r.repo_id != repo_id)
            .cloned()
            .collect();
        let removed = rows.len() - retained.len();
        if removed > 0 {
            // Memory only changes once the file does
            self.persist(&retained)?;
            *rows = retained;
        }
        Ok(removed)
    }

    async fn count(&self, repo_id: &str) -> Result<usize, StoreError> {
        Ok(self.rows.read().iter().filter(|r| r.repo_id == repo_id).count())
    }
}

/// Repository-scoped fragment store with exact cosine ranking.
#[derive(Clone)]
pub struct VectorStore {
    rows: Arc<dyn RowStore>,
    insert_batch_size: usize,
}

impl VectorStore {
    pub fn new(rows: Arc<dyn RowStore>, config: &StoreConfig) -> Self {
        Self {
            rows,
            insert_batch_size: config.insert_batch_size.max(1),
        }
    }

    /// Store embedded fragments as `chunk_0..chunk_{n-1}` of `repo_id`.
    ///
    /// Rows are appended in batches; the first failing batch aborts the call
    /// and batches written before it stay in place.
    pub async fn insert(
        &self,
        repo_id: &str,
        fragments: &[EmbeddedFragment],
    ) -> Result<usize, StoreError> {
        let size = self.insert_batch_size;
        let total_batches = fragments.len().div_ceil(size);
        let mut added = 0usize;

        for (batch_index, batch) in fragments.chunks(size).enumerate() {
            let created_at = Utc::now();
            let rows: Vec<StoredFragment> = batch
                .iter()
                .enumerate()
                .map(|(j, ef)| StoredFragment {
                    repo_id: repo_id.to_string(),
                    chunk_id: format!("chunk_{}", batch_index * size + j),
                    content: ef.fragment.content.clone(),
                    metadata: ef.fragment.metadata.clone(),
                    embedding: ef.embedding.clone(),
                    created_at,
                })
                .collect();

            if let Err(e) = self.rows.append(rows).await {
                tracing::error!(
                    "Insert batch {}/{total_batches} for {repo_id} failed: {e}",
                    batch_index + 1
                );
                return Err(e);
            }
            added += batch.len();
            tracing::debug!(
                "Added batch {}/{total_batches} ({added}/{} rows) for {repo_id}",
                batch_index + 1,
                fragments.len()
            );
        }

        tracing::info!("Stored {added} fragments for {repo_id}");
        Ok(added)
    }

    /// Full-scan ranking of every row of `repo_id` against `query_vector`.
    pub async fn try_query(
        &self,
        repo_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, StoreError> {
        let rows = self.rows.scan(repo_id).await?;
        if rows.is_empty() {
            tracing::info!("No fragments stored for {repo_id}");
            return Ok(Vec::new());
        }

        let scored: Vec<(f32, StoredFragment)> = rows
            .into_iter()
            .map(|row| (distance(query_vector, &row.embedding), row))
            .collect();

        let hits: Vec<QueryHit> = rank_by_distance(scored, top_k)
            .into_iter()
            .map(|(distance, row)| QueryHit {
                chunk_id: row.chunk_id,
                content: row.content,
                metadata: row.metadata,
                distance,
            })
            .collect();

        tracing::debug!("Returning {} fragments for {repo_id}", hits.len());
        Ok(hits)
    }

    /// Like [`try_query`](Self::try_query) but a store failure reads as "no results".
    pub async fn query(&self, repo_id: &str, query_vector: &[f32], top_k: usize) -> Vec<QueryHit> {
        match self.try_query(repo_id, query_vector, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Query for {repo_id} failed, returning no results: {e}");
                Vec::new()
            }
        }
    }

    /// Remove every row of `repo_id`. Deleting an empty repository is not an error.
    pub async fn delete_all(&self, repo_id: &str) -> Result<(), StoreError> {
        let removed = self.rows.remove(repo_id).await?;
        tracing::info!("Deleted {removed} fragments for {repo_id}");
        Ok(())
    }

    pub async fn try_stats(&self, repo_id: &str) -> Result<RepoStats, StoreError> {
        let rows = self.rows.scan(repo_id).await?;
        Ok(RepoStats {
            chunk_count: rows.len(),
            last_updated: rows.iter().map(|r| r.created_at).max(),
        })
    }

    pub async fn stats(&self, repo_id: &str) -> RepoStats {
        self.try_stats(repo_id).await.unwrap_or_else(|e| {
            tracing::warn!("Stats for {repo_id} failed: {e}");
            RepoStats::default()
        })
    }

    /// Whether any row exists for `repo_id`; a failing store counts as empty.
    pub async fn has_data(&self, repo_id: &str) -> bool {
        match self.rows.count(repo_id).await {
            Ok(count) => count > 0,
            Err(e) => {
                tracing::warn!("Could not check stored data for {repo_id}: {e}");
                false
            }
        }
    }

    pub fn collection(&self, repo_id: &str) -> RepoCollection {
        RepoCollection::new(self.clone(), repo_id)
    }
}

/// Insert/query handle bound to one repository.
#[async_trait]
pub trait Collection: Send + Sync {
    fn repo_id(&self) -> &str;

    async fn insert(&self, fragments: &[EmbeddedFragment]) -> Result<usize, StoreError>;

    async fn query(&self, query_vector: &[f32], top_k: usize) -> Vec<QueryHit>;
}

#[derive(Clone)]
pub struct RepoCollection {
    store: VectorStore,
    repo_id: String,
}

impl RepoCollection {
    pub fn new(store: VectorStore, repo_id: &str) -> Self {
        Self {
            store,
            repo_id: repo_id.to_string(),
        }
    }
}

#[async_trait]
impl Collection for RepoCollection {
    fn repo_id(&self) -> &str {
        &self.repo_id
    }

    async fn insert(&self, fragments: &[EmbeddedFragment]) -> Result<usize, StoreError> {
        self.store.insert(&self.repo_id, fragments).await
    }

    async fn query(&self, query_vector: &[f32], top_k: usize) -> Vec<QueryHit> {
        self.store.query(&self.repo_id, query_vector, top_k).await
    }
}
