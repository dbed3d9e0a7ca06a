//! # Travel Search
//!
//! Semantic search over a tourism CSV of stores (restaurants, lodging,
//! attractions) with city, type, and date filters, plus in-place renaming
//! of stored records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  CSV source │──▶│  Normalize + │──▶│    SQLite    │
//! │  (csv)      │   │  Embed batch │   │  collection  │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                           ┌─────────────────┤
//!                           ▼                 ▼
//!                    ┌────────────┐    ┌────────────┐
//!                    │   search   │    │   rename   │
//!                    │ (filtered) │    │ then search│
//!                    └────────────┘    └────────────┘
//! ```
//!
//! The pipeline itself (normalization, predicates, ranking, rename) lives
//! in `travel-search-core`; this crate supplies the SQLite collection,
//! the HTTP embedding provider, config, and the `travel` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! travel init
//! travel ingest --debug
//! travel search "好吃的蕎麥麵" --city 南投縣 --type 美食
//! travel rename "好吃的蕎麥麵" --store-name 耄饕客棧 --new-name 田媽媽（耄饕客棧）
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`embedding`] | OpenAI / Azure OpenAI embedding providers |
//! | [`sqlite_store`] | SQLite-backed collection |
//! | [`collection`] | Opening the configured collection |
//! | [`source`] | CSV source reader |
//! | [`ingest`] | Ingestion entry points |
//! | [`query`] | Filtered search and rename-then-search |
//! | [`stats`] | Collection statistics |

pub mod collection;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod query;
pub mod source;
pub mod sqlite_store;
pub mod stats;
