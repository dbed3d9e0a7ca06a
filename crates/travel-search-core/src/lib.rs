//! # Travel Search Core
//!
//! Storage-agnostic logic for Travel Search: the record model, row
//! normalization, metadata predicates, the [`store::Collection`] trait, the
//! embedding provider trait, and the three pipeline operations (ingest,
//! filtered search, rename-then-search).
//!
//! This crate contains no sqlx, HTTP, or filesystem code. Everything that
//! touches a real vector store or embedding service is reached through
//! [`store::Collection`] and [`embedding::EmbeddingProvider`], so the
//! pipeline can be exercised against [`store::memory::InMemoryCollection`].

pub mod embedding;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod patch;
pub mod search;
pub mod store;
