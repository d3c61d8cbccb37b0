//! Integration tests for the ingestion and retrieval flow.
//!
//! Repositories come from a local directory mirror and embeddings from a
//! deterministic keyword-count model, so no network access is needed.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use devinsight::api;
use devinsight::config::{BatchConfig, Config, StoreConfig};
use devinsight::ingest::ingest;
use devinsight::llm::embeddings::{EmbedError, Embedder};
use devinsight::search::vector::{MemoryRowStore, VectorStore};
use devinsight::source::{LocalSource, RepoRef};
use devinsight::state::AppState;

const KEYWORDS: [&str; 6] = ["user", "handler", "math", "sum", "format", "date"];

/// One dimension per keyword, valued by its occurrence count.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let lower = text.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect())
    }
}

const USERS_HANDLER: &str = r#"/**
 * List users.
 */
export default async function handler(req, res) {
  if (req.method === 'GET') {
    const limit = req.query.limit;
    return res.status(200).json({ users: userList, total: totalCount });
  }
  res.status(405).json({ error: 'Method not allowed' });
}
"#;

const MATH_PY: &str = r#"import math

def sum_squares(values):
    return math.fsum(v * v for v in values)
"#;

const UTILS_JS: &str = r#"function formatDate(date) {
  return date.toISOString().slice(0, 10);
}
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A mirror of `octo/demo` with three indexable files.
fn sample_mirror() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().join("octo/demo");
    write(&base, "pages/api/users.js", USERS_HANDLER);
    write(&base, "lib/math.py", MATH_PY);
    write(&base, "src/utils.js", UTILS_JS);
    write(&base, "src/tiny.js", "let a = 1;");
    write(&base, "README.md", "# demo\n\nNot indexed.");
    tmp
}

fn quick_config() -> Config {
    let mut config = Config::default();
    config.batch = BatchConfig {
        batch_size: 5,
        stagger_ms: 0,
        inter_batch_delay_ms: 0,
    };
    config
}

async fn spawn_app(mirror: &Path) -> String {
    let config = quick_config();
    let store = VectorStore::new(Arc::new(MemoryRowStore::in_memory(0)), &config.store);
    let source = Arc::new(LocalSource::new(mirror, config.github.max_file_chars));
    let state = AppState::with_parts(config, store, Arc::new(KeywordEmbedder), source);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let resp = client.post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_process_search_explore_delete() {
    let mirror = sample_mirror();
    let base = spawn_app(mirror.path()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        format!("{base}/api/process-repo"),
        json!({ "url": "https://github.com/octo/demo" }),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["repository"]["name"], "demo");
    assert_eq!(body["processedFiles"], 3);
    assert_eq!(body["processedChunks"], 3);
    assert!(body.get("message").is_none());

    let (status, stats) = post(
        &client,
        format!("{base}/api/repo-stats"),
        json!({ "repoId": "octo/demo" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(stats["chunkCount"], 3);
    assert!(stats["lastUpdated"].is_string());

    let (status, found) = post(
        &client,
        format!("{base}/api/search"),
        json!({ "repoId": "octo/demo", "query": "user handler", "topK": 2 }),
    )
    .await;
    assert_eq!(status, 200);
    let results = found["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["metadata"]["path"], "pages/api/users.js");
    assert_eq!(results[0]["metadata"]["chunkType"], "complete");
    let d0 = results[0]["distance"].as_f64().unwrap();
    let d1 = results[1]["distance"].as_f64().unwrap();
    assert!(d0 <= d1);
    assert!(results[0]["chunkId"].as_str().unwrap().starts_with("chunk_"));

    let (status, explored) = post(
        &client,
        format!("{base}/api/api-explorer"),
        json!({ "repoId": "octo/demo" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(explored["apiRoot"], "/api");
    let endpoints = explored["endpoints"].as_array().unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0]["path"], "/api/users");
    assert_eq!(endpoints[0]["method"], "GET");
    assert_eq!(endpoints[0]["description"], "List users.");
    assert_eq!(endpoints[0]["requestParams"][0]["name"], "limit");
    assert_eq!(explored["debug"]["totalChunks"], 3);

    let (status, deleted) = post(
        &client,
        format!("{base}/api/delete-repo"),
        json!({ "repoId": "octo/demo" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(deleted, json!({ "success": true }));

    let (_, stats) = post(
        &client,
        format!("{base}/api/repo-stats"),
        json!({ "repoId": "octo/demo" }),
    )
    .await;
    assert_eq!(stats, json!({ "chunkCount": 0, "lastUpdated": null }));
}

#[tokio::test]
async fn test_no_data_is_success_with_message() {
    let mirror = sample_mirror();
    let base = spawn_app(mirror.path()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        format!("{base}/api/search"),
        json!({ "repoId": "octo/unknown", "query": "anything" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["results"], json!([]));
    assert!(body["message"].is_string());

    let (status, body) = post(
        &client,
        format!("{base}/api/api-explorer"),
        json!({ "repoId": "octo/unknown" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["endpoints"], json!([]));
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_empty_repository_reports_message() {
    let tmp = tempfile::tempdir().unwrap();
    write(&tmp.path().join("octo/docs"), "README.md", "# only docs here");
    let base = spawn_app(tmp.path()).await;

    let (status, body) = post(
        &reqwest::Client::new(),
        format!("{base}/api/process-repo"),
        json!({ "url": "https://github.com/octo/docs" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["processedFiles"], 0);
    assert_eq!(body["processedChunks"], 0);
    assert_eq!(body["message"], "No supported files found in repository");
}

#[tokio::test]
async fn test_bad_requests() {
    let mirror = sample_mirror();
    let base = spawn_app(mirror.path()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, format!("{base}/api/process-repo"), json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "GitHub URL is required");

    let (status, body) = post(
        &client,
        format!("{base}/api/process-repo"),
        json!({ "url": "https://gitlab.com/octo/demo" }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid GitHub URL");

    for endpoint in [
        "search",
        "api-explorer",
        "repo-stats",
        "delete-repo",
        "dependency-map",
    ] {
        let (status, body) =
            post(&client, format!("{base}/api/{endpoint}"), json!({ "query": "x" })).await;
        assert_eq!(status, 400, "{endpoint}");
        assert_eq!(body["error"], "Repository ID is required");
    }

    let (status, body) = post(
        &client,
        format!("{base}/api/search"),
        json!({ "repoId": "octo/demo" }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Query is required");

    let (status, body) = post(
        &client,
        format!("{base}/api/process-repo"),
        json!({ "url": "https://github.com/octo/missing" }),
    )
    .await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "Failed to process repository");
    assert!(body["message"].is_string());
}

const INDEX_JS: &str = r#"import { formatDate } from './utils';
import React from 'react';
const math = require('../lib/math.py');

export default function main() {
  return formatDate(new Date());
}
"#;

#[tokio::test]
async fn test_dependency_map_after_processing() {
    let tmp = tempfile::tempdir().unwrap();
    let base_dir = tmp.path().join("octo/graph");
    write(&base_dir, "src/index.js", INDEX_JS);
    write(&base_dir, "src/utils.js", UTILS_JS);
    write(&base_dir, "lib/math.py", MATH_PY);
    let base = spawn_app(tmp.path()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        format!("{base}/api/dependency-map"),
        json!({ "repoId": "octo/graph" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["nodes"], json!([]));
    assert_eq!(body["links"], json!([]));
    assert!(body["message"].is_string());

    let (status, _) = post(
        &client,
        format!("{base}/api/process-repo"),
        json!({ "url": "https://github.com/octo/graph" }),
    )
    .await;
    assert_eq!(status, 200);

    let (status, graph) = post(
        &client,
        format!("{base}/api/dependency-map"),
        json!({ "repoId": "octo/graph" }),
    )
    .await;
    assert_eq!(status, 200, "{graph}");
    assert!(graph.get("message").is_none());
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(graph["metadata"]["analyzedFiles"], 3);
    assert_eq!(graph["metadata"]["dependencies"], 2);

    let index = graph["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["id"] == "src/index.js")
        .unwrap();
    assert_eq!(index["type"], "file");
    assert_eq!(index["language"], "javascript");
    assert!(index["weight"].as_u64().unwrap() > 1);

    let mut links: Vec<(String, String, String)> = graph["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| {
            (
                l["source"].as_str().unwrap().to_string(),
                l["target"].as_str().unwrap().to_string(),
                l["type"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    links.sort();
    assert_eq!(
        links,
        vec![
            ("src/index.js".into(), "lib/math.py".into(), "require".into()),
            ("src/index.js".into(), "src/utils.js".into(), "import".into()),
        ]
    );
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let mirror = sample_mirror();
    let base = spawn_app(mirror.path()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/api/search")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 405);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Method not allowed" }));

    let resp = client.post(format!("{base}/api/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 405);
}

#[tokio::test]
async fn test_health_reports_embedding() {
    let mirror = sample_mirror();
    let base = spawn_app(mirror.path()).await;

    let body: Value = reqwest::get(format!("{base}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "ok", "embedding": true }));
}

#[tokio::test]
async fn test_ingested_rows_survive_reopen() {
    let mirror = sample_mirror();
    let data = tempfile::tempdir().unwrap();
    let config = quick_config();
    let source = LocalSource::new(mirror.path(), config.github.max_file_chars);
    let repo = RepoRef::from_id("octo/demo").unwrap();

    {
        let rows = MemoryRowStore::open_or_create(data.path(), 0).unwrap();
        let store = VectorStore::new(Arc::new(rows), &StoreConfig::default());
        let report = ingest(
            &source,
            &KeywordEmbedder,
            &store,
            &repo,
            &config.ingest,
            &config.batch,
        )
        .await
        .unwrap();
        assert_eq!(report.processed_chunks, 3);
    }

    let rows = MemoryRowStore::open_or_create(data.path(), 0).unwrap();
    let store = VectorStore::new(Arc::new(rows), &StoreConfig::default());
    assert_eq!(store.stats("octo/demo").await.chunk_count, 3);

    // Query equal to a stored vector ranks that fragment first at distance ~0
    let target = KeywordEmbedder
        .embed(&format!("lib/math.py: Complete file\n\n{MATH_PY}"))
        .await
        .unwrap();
    let hits = store.query("octo/demo", &target, 1).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.path, "lib/math.py");
    assert!(hits[0].distance.abs() < 1e-5);
}
