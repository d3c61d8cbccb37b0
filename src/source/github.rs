use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{is_supported_file, should_skip_dir, FileSource, RemoteFile, RepoRef, MAX_DESCEND_DEPTH};
use crate::config::GitHubConfig;
use crate::models::{RepositoryInfo, RepositoryOwner};

const BOT_USER_AGENT: &str = "DevInsight-Bot/1.0";

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    owner: OwnerResponse,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    download_url: Option<String>,
}

/// The contents API returns an array for directories and an object for files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Dir(Vec<ContentEntry>),
    File(ContentEntry),
}

/// Lists and downloads files through the GitHub REST API.
///
/// Successful downloads are cached by URL until the next `list_files` call,
/// so one ingestion run never downloads a file twice while a later run sees
/// the branch's current contents.
pub struct GitHubSource {
    client: reqwest::Client,
    config: GitHubConfig,
    downloads: Mutex<HashMap<String, String>>,
}

impl GitHubSource {
    pub fn new(client: reqwest::Client, config: GitHubConfig) -> Self {
        Self {
            client,
            config,
            downloads: Mutex::new(HashMap::new()),
        }
    }

    fn api_get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(url)
            .header(USER_AGENT, BOT_USER_AGENT)
            .header(ACCEPT, "application/vnd.github+json");
        match &self.config.token {
            Some(token) if !token.is_empty() => req.bearer_auth(token),
            _ => req,
        }
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if path.is_empty() {
            format!("{base}/repos/{}/{}/contents", repo.owner, repo.repo)
        } else {
            format!("{base}/repos/{}/{}/contents/{path}", repo.owner, repo.repo)
        }
    }

    /// One directory listing: supported files plus subdirectories worth visiting.
    async fn list_dir(&self, repo: &RepoRef, path: &str) -> Result<(Vec<RemoteFile>, Vec<String>)> {
        let resp = self
            .api_get(&self.contents_url(repo, path))
            .send()
            .await?
            .error_for_status()?;
        let entries = match resp.json::<ContentsResponse>().await? {
            ContentsResponse::Dir(entries) => entries,
            ContentsResponse::File(entry) => vec![entry],
        };

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in entries {
            match entry.kind.as_str() {
                "file" if is_supported_file(&entry.name) => {
                    if entry.size > self.config.max_file_chars as u64 {
                        tracing::debug!("Skipping large file {} ({} bytes)", entry.path, entry.size);
                        continue;
                    }
                    let Some(download_url) = entry.download_url else {
                        continue;
                    };
                    files.push(RemoteFile {
                        path: entry.path,
                        download_url,
                        size: entry.size,
                    });
                }
                "dir" if !should_skip_dir(&entry.name) => dirs.push(entry.path),
                _ => {}
            }
        }
        Ok((files, dirs))
    }
}

#[async_trait]
impl FileSource for GitHubSource {
    async fn describe(&self, repo: &RepoRef) -> Result<RepositoryInfo> {
        let base = self.config.api_base.trim_end_matches('/');
        let url = format!("{base}/repos/{}/{}", repo.owner, repo.repo);
        let data: RepoResponse = self
            .api_get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Failed to fetch repository information")?
            .json()
            .await
            .context("Failed to fetch repository information")?;

        Ok(RepositoryInfo {
            name: data.name,
            description: data.description,
            stars: data.stargazers_count,
            language: data.language,
            owner: RepositoryOwner {
                name: data.owner.login,
                avatar: data.owner.avatar_url,
            },
        })
    }

    /// Breadth-first walk. Each level's directories are listed in windows of
    /// `listing_concurrency`; a failed listing contributes nothing.
    async fn list_files(&self, repo: &RepoRef) -> Result<Vec<RemoteFile>> {
        self.downloads.lock().clear();

        let (mut files, mut frontier) = self
            .list_dir(repo, "")
            .await
            .with_context(|| format!("Failed to list files of {repo}"))?;

        let window = self.config.listing_concurrency.max(1);
        let mut depth = 0;
        while !frontier.is_empty() && depth < MAX_DESCEND_DEPTH {
            depth += 1;
            let mut next = Vec::new();
            for batch in frontier.chunks(window) {
                let listings = join_all(batch.iter().map(|dir| self.list_dir(repo, dir))).await;
                for (dir, listing) in batch.iter().zip(listings) {
                    match listing {
                        Ok((dir_files, subdirs)) => {
                            files.extend(dir_files);
                            next.extend(subdirs);
                        }
                        Err(e) => tracing::warn!("Error listing {repo}/{dir}: {e}"),
                    }
                }
            }
            frontier = next;
        }

        tracing::info!("Found {} supported files in {repo}", files.len());
        Ok(files)
    }

    async fn fetch(&self, file: &RemoteFile) -> Option<String> {
        let cached = self.downloads.lock().get(&file.download_url).cloned();
        if cached.is_some() {
            return cached;
        }

        let result = self
            .client
            .get(&file.download_url)
            .header(USER_AGENT, BOT_USER_AGENT)
            .timeout(Duration::from_secs(self.config.download_timeout_secs))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let content = match result {
            Ok(resp) => match resp.text().await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!("Error reading {}: {e}", file.path);
                    None
                }
            },
            Err(e) if e.is_timeout() => {
                tracing::warn!("Timeout fetching file: {}", file.download_url);
                None
            }
            Err(e) => {
                tracing::warn!("Error fetching file content for {}: {e}", file.path);
                None
            }
        };

        let content = content.filter(|text| {
            let chars = text.chars().count();
            if chars > self.config.max_file_chars {
                tracing::info!("Large file detected: {} ({chars} chars)", file.path);
                false
            } else {
                true
            }
        });

        // Failures stay unavailable for this call only
        if let Some(text) = &content {
            self.downloads
                .lock()
                .insert(file.download_url.clone(), text.clone());
        }
        content
    }
}
