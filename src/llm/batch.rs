//! Windowed concurrent embedding of fragment lists.

use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::config::BatchConfig;
use crate::llm::embeddings::{EmbedError, Embedder};
use crate::models::{EmbeddedFragment, Fragment};

/// Text actually sent to the model: provenance first, then the code.
pub fn embedding_input(fragment: &Fragment) -> String {
    format!(
        "{}: {}\n\n{}",
        fragment.metadata.path, fragment.metadata.name, fragment.content
    )
}

/// Embed `fragments` in concurrent windows of `config.batch_size`.
///
/// Output follows input order. A fragment whose embedding fails is dropped and
/// logged; the call only fails when every fragment failed.
pub async fn embed_batch(
    embedder: &dyn Embedder,
    fragments: &[Fragment],
    config: &BatchConfig,
) -> Result<Vec<EmbeddedFragment>, EmbedError> {
    if fragments.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = config.batch_size.max(1);
    let total_batches = fragments.len().div_ceil(batch_size);
    tracing::info!(
        "Embedding {} fragments in {total_batches} batches",
        fragments.len()
    );

    let mut embedded: Vec<(usize, EmbeddedFragment)> = Vec::with_capacity(fragments.len());
    let mut failed = 0usize;
    let mut last_error = String::new();

    for (batch_index, batch) in fragments.chunks(batch_size).enumerate() {
        let base = batch_index * batch_size;

        let mut pending: FuturesUnordered<_> = batch
            .iter()
            .enumerate()
            .map(|(offset, fragment)| {
                let delay = config.stagger() * offset as u32;
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let outcome = embedder.embed(&embedding_input(fragment)).await;
                    (base + offset, fragment, outcome)
                }
            })
            .collect();

        // Completion order is arbitrary; the index restores it below
        while let Some((index, fragment, outcome)) = pending.next().await {
            match outcome {
                Ok(embedding) => embedded.push((
                    index,
                    EmbeddedFragment {
                        fragment: fragment.clone(),
                        embedding,
                    },
                )),
                Err(e) => {
                    tracing::warn!(
                        "Failed to embed fragment {} ({} / {}): {e}",
                        index + 1,
                        fragment.metadata.path,
                        fragment.metadata.name
                    );
                    failed += 1;
                    last_error = e.to_string();
                }
            }
        }

        tracing::debug!("Embedded batch {}/{total_batches}", batch_index + 1);

        if batch_index + 1 < total_batches && !config.inter_batch_delay().is_zero() {
            tokio::time::sleep(config.inter_batch_delay()).await;
        }
    }

    if embedded.is_empty() {
        return Err(EmbedError::AllFailed {
            failed,
            last: last_error,
        });
    }

    embedded.sort_by_key(|(index, _)| *index);
    tracing::info!(
        "Embedded {}/{} fragments",
        embedded.len(),
        fragments.len()
    );
    Ok(embedded.into_iter().map(|(_, ef)| ef).collect())
}
