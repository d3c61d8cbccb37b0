//! Where repository files come from.
//!
//! `GitHubSource` walks the GitHub contents API; `LocalSource` reads a
//! directory mirror laid out as `<root>/<owner>/<repo>`. Both apply the same
//! extension and directory filters.

pub mod github;
pub mod local;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::RepositoryInfo;

pub use github::GitHubSource;
pub use local::LocalSource;

/// Extensions worth indexing, without the leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "py", "java", "go", "cpp", "hpp", "h", "c", "rs", "html", "css",
];

const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    "venv",
    "__pycache__",
    "vendor",
    ".cache",
    "coverage",
    ".nyc_output",
    "public",
    "static",
];

/// Directories found at this depth are not descended; the root is depth 0.
pub const MAX_DESCEND_DEPTH: usize = 3;

/// Minified bundles are skipped even with a supported extension.
pub fn is_supported_file(file_name: &str) -> bool {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str()) && !file_name.contains(".min.")
}

pub fn should_skip_dir(dir_name: &str) -> bool {
    dir_name.starts_with('.') || SKIPPED_DIRS.contains(&dir_name.to_lowercase().as_str())
}

/// A listed file, not yet downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub download_url: String,
    pub size: u64,
}

/// An `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parse `https://github.com/<owner>/<repo>[/...]`.
    pub fn parse_github_url(url: &str) -> Result<Self> {
        let parsed = match reqwest::Url::parse(url.trim()) {
            Ok(parsed) => parsed,
            Err(e) => bail!("Invalid GitHub URL: {e}"),
        };

        if parsed.host_str() != Some("github.com") {
            bail!("Invalid GitHub URL: Not a valid GitHub URL");
        }

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < 2 {
            bail!("Invalid GitHub URL: URL does not contain a valid repository path");
        }

        Ok(Self {
            owner: segments[0].to_string(),
            repo: segments[1].trim_end_matches(".git").to_string(),
        })
    }

    /// Parse a stored `owner/repo` identifier.
    pub fn from_id(repo_id: &str) -> Option<Self> {
        let (owner, repo) = repo_id.split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Partition key used by the vector store.
    pub fn repo_id(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A place repository files can be listed and downloaded from.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn describe(&self, repo: &RepoRef) -> Result<RepositoryInfo>;

    async fn list_files(&self, repo: &RepoRef) -> Result<Vec<RemoteFile>>;

    /// `None` when the file is unavailable, timed out or too large.
    async fn fetch(&self, file: &RemoteFile) -> Option<String>;
}
