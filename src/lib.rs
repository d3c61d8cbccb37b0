//! # devinsight
//!
//! Repository ingestion and exact vector retrieval for code-analysis features.
//! A repository's files are split into declaration-sized fragments, embedded
//! through a hosted feature-extraction model and stored per repository; queries
//! rank every stored fragment of one repository by cosine distance.
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────┐         ┌──────────────┐
//!        │  GitHub URL  │         │ Query / probe│
//!        └──────┬───────┘         └──────┬───────┘
//!               │                        │
//!               ▼                        │
//!     ┌───────────────────┐              │
//!     │    File Source    │              │
//!     │ list (depth ≤ 3)  │              │
//!     │ fetch (10 s, ×5)  │              │
//!     └─────────┬─────────┘              │
//!               │ ≤ 100 files            │
//!               ▼                        │
//!     ┌───────────────────┐              │
//!     │      Chunker      │              │
//!     │ small → complete  │              │
//!     │ js/ts, py → decls │              │
//!     │ other → windows   │              │
//!     └─────────┬─────────┘              │
//!               │ ≤ 20 per file, ≤ 500   │
//!               ▼                        ▼
//!     ┌──────────────────────────────────────┐
//!     │           Embedding Client           │
//!     │  "{path}: {name}\n\n{content}"       │
//!     │  groups of 5, staggered, 503 retry   │
//!     └─────────┬────────────────────┬───────┘
//!               │ insert             │ query vector
//!               ▼                    ▼
//!     ┌──────────────────────────────────────┐
//!     │             Vector Store             │
//!     │  rows scoped by "owner/repo"         │
//!     │  full scan, distance = 1 - cos,      │
//!     │  stable ascending sort, top k        │
//!     └──────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for the server, model, limits and pacing
//! - [`models`] - Fragments, stored rows, query hits and HTTP request/response types
//! - [`chunking`] - File splitting: whole-file, declaration-aware (JS/TS, Python) and fixed windows
//! - [`source`] - GitHub contents API walker and a local directory mirror
//! - [`llm::embeddings`] - Hugging Face feature-extraction client with model-loading retry
//! - [`llm::batch`] - Windowed concurrent embedding that tolerates per-item failures
//! - [`search::similarity`] - Cosine similarity and stable distance ranking
//! - [`search::vector`] - Repository-scoped vector store with JSON persistence
//! - [`ingest`] - The delete-then-reinsert ingestion pipeline
//! - [`explorer`] - Heuristic API endpoint extraction from retrieved handler code
//! - [`dependency`] - File-level import graph for repositories that have been processed
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod dependency;
pub mod explorer;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod search;
pub mod source;
pub mod state;
