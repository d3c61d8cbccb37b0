//! Exact vector retrieval: cosine ranking and the repository-scoped store.

pub mod similarity;
pub mod vector;
