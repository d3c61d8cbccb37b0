use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("HUGGINGFACE_API_KEY is not set")]
    MissingApiKey,
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding API error: {status} - {body}")]
    Api { status: StatusCode, body: String },
    #[error("embedding retry failed: {status}")]
    RetryFailed { status: StatusCode },
    #[error("invalid response format")]
    InvalidResponse,
    #[error("failed to embed all {failed} fragments, last error: {last}")]
    AllFailed { failed: usize, last: String },
}

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed a probe sentence and report whether a vector came back.
    async fn check_connection(&self) -> bool {
        match self.embed("This is a test.").await {
            Ok(vector) => !vector.is_empty(),
            Err(e) => {
                tracing::warn!("Embedding connection check failed: {e}");
                false
            }
        }
    }
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// Client for a hosted feature-extraction model (Hugging Face inference API).
pub struct HuggingFaceEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_input_chars: usize,
    model_loading_retry: Duration,
}

impl HuggingFaceEmbedder {
    /// Fails when no API key is configured.
    pub fn new(client: reqwest::Client, config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(EmbedError::MissingApiKey)?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            api_key,
            max_input_chars: config.max_input_chars,
            model_loading_retry: config.model_loading_retry(),
        })
    }

    async fn post(&self, text: &str) -> Result<reqwest::Response, EmbedError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&InferenceRequest { inputs: text })
            .send()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let text = truncate_for_model(text, self.max_input_chars);

        let resp = self.post(text).await?;
        let status = resp.status();
        if status.is_success() {
            let vector = parse_embedding(&resp.text().await?)?;
            tracing::debug!("Generated embedding with {} dimensions", vector.len());
            return Ok(vector);
        }

        let body = resp.text().await.unwrap_or_default();
        tracing::error!("Embedding API error: {status} {body}");

        // 503 means the model is still loading
        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::info!(
                "Model loading, retrying once in {:?}",
                self.model_loading_retry
            );
            tokio::time::sleep(self.model_loading_retry).await;

            let retry = self.post(text).await?;
            if !retry.status().is_success() {
                return Err(EmbedError::RetryFailed {
                    status: retry.status(),
                });
            }
            let vector = parse_embedding(&retry.text().await?)?;
            tracing::debug!(
                "Generated embedding with {} dimensions after retry",
                vector.len()
            );
            return Ok(vector);
        }

        Err(EmbedError::Api { status, body })
    }
}

fn truncate_for_model(text: &str, max_chars: usize) -> &str {
    let truncated = truncate_chars(text, max_chars);
    if truncated.len() < text.len() {
        tracing::debug!("Truncated embedding input to {max_chars} characters");
    }
    truncated
}

/// A valid response is a non-empty JSON array of numbers.
fn parse_embedding(body: &str) -> Result<Vec<f32>, EmbedError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| EmbedError::InvalidResponse)?;
    let items = value.as_array().ok_or(EmbedError::InvalidResponse)?;
    if items.is_empty() {
        return Err(EmbedError::InvalidResponse);
    }
    items
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32).ok_or(EmbedError::InvalidResponse))
        .collect()
}
