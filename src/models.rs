use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunking::Language;
use crate::dependency::{DependencyLink, DependencyNode, GraphStats};
use crate::explorer::{Endpoint, ExplorerDebug};

/// How a fragment was cut out of its file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// The whole file in one fragment
    Complete,
    /// A declaration-delimited span from a language-aware splitter
    Code,
    /// A fixed-size character window
    Chunk,
}

/// Provenance carried by every fragment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FragmentMetadata {
    pub path: String,
    pub language: Language,
    pub extension: String,
    pub chunk_type: ChunkType,
    /// Detected symbol name or a positional label
    pub name: String,
}

/// A bounded span of one file's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fragment {
    pub content: String,
    pub metadata: FragmentMetadata,
}

/// A fragment together with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedFragment {
    #[serde(flatten)]
    pub fragment: Fragment,
    pub embedding: Vec<f32>,
}

/// A row of the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFragment {
    pub repo_id: String,
    /// Unique within one repository's rows
    pub chunk_id: String,
    pub content: String,
    pub metadata: FragmentMetadata,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A ranked query result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHit {
    pub chunk_id: String,
    pub content: String,
    pub metadata: FragmentMetadata,
    /// `1 - cosine similarity`; lower is closer
    pub distance: f32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepoStats {
    pub chunk_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryOwner {
    pub name: String,
    pub avatar: Option<String>,
}

/// Repository description as reported by a file source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryInfo {
    pub name: String,
    pub description: Option<String>,
    pub stars: u64,
    pub language: Option<String>,
    pub owner: RepositoryOwner,
}

/// Process-repo request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessRepoRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Process-repo response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRepoResponse {
    pub success: bool,
    pub repository: RepositoryInfo,
    pub processed_files: usize,
    pub processed_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body shared by the endpoints that only need a repository id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRequest {
    #[serde(default)]
    pub repo_id: Option<String>,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub repo_id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<QueryHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Delete-repo response
#[derive(Debug, Clone, Serialize)]
pub struct DeleteRepoResponse {
    pub success: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Whether the embedding model answered a probe request
    pub embedding: bool,
}

/// API explorer response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiExplorerResponse {
    pub api_root: String,
    pub endpoints: Vec<Endpoint>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ExplorerDebug>,
}

/// Dependency map response
#[derive(Debug, Clone, Serialize)]
pub struct DependencyMapResponse {
    pub nodes: Vec<DependencyNode>,
    pub links: Vec<DependencyLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GraphStats>,
}
