//! Remote embedding model client and batch embedding.

pub mod batch;
pub mod embeddings;
