use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{is_supported_file, should_skip_dir, FileSource, RemoteFile, RepoRef, MAX_DESCEND_DEPTH};
use crate::models::{RepositoryInfo, RepositoryOwner};

/// Serves repositories from a directory mirror: `<root>/<owner>/<repo>`.
pub struct LocalSource {
    root: PathBuf,
    max_file_chars: usize,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>, max_file_chars: usize) -> Self {
        Self {
            root: root.into(),
            max_file_chars,
        }
    }

    fn repo_dir(&self, repo: &RepoRef) -> PathBuf {
        self.root.join(&repo.owner).join(&repo.repo)
    }
}

/// Walk `repo_dir` with the same filters and depth limit as the GitHub
/// listing. Shallow files come first, then by path.
fn walk_supported_files(repo_dir: &Path, max_file_chars: usize) -> Vec<RemoteFile> {
    let mut found: Vec<(usize, RemoteFile)> = Vec::new();

    for entry in WalkDir::new(repo_dir)
        .max_depth(MAX_DESCEND_DEPTH + 1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !should_skip_dir(&e.file_name().to_string_lossy())
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if !is_supported_file(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > max_file_chars as u64 {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(repo_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        found.push((
            entry.depth(),
            RemoteFile {
                path: relative,
                download_url: path.to_string_lossy().to_string(),
                size,
            },
        ));
    }

    found.sort_by_key(|(depth, _)| *depth);
    found.into_iter().map(|(_, file)| file).collect()
}

#[async_trait]
impl FileSource for LocalSource {
    async fn describe(&self, repo: &RepoRef) -> Result<RepositoryInfo> {
        if !self.repo_dir(repo).is_dir() {
            bail!("Failed to fetch repository information: {repo} not found");
        }
        Ok(RepositoryInfo {
            name: repo.repo.clone(),
            description: None,
            stars: 0,
            language: None,
            owner: RepositoryOwner {
                name: repo.owner.clone(),
                avatar: None,
            },
        })
    }

    async fn list_files(&self, repo: &RepoRef) -> Result<Vec<RemoteFile>> {
        let dir = self.repo_dir(repo);
        let max_file_chars = self.max_file_chars;
        let files =
            tokio::task::spawn_blocking(move || walk_supported_files(&dir, max_file_chars)).await?;
        tracing::info!("Found {} supported files in {repo}", files.len());
        Ok(files)
    }

    async fn fetch(&self, file: &RemoteFile) -> Option<String> {
        match tokio::fs::read_to_string(&file.download_url).await {
            Ok(content) if content.chars().count() > self.max_file_chars => {
                tracing::info!("Large file detected: {}", file.path);
                None
            }
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!("Error reading {}: {e}", file.path);
                None
            }
        }
    }
}
