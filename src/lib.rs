//! codequarry: token-budgeted MCP server for multi-workspace code search.
//!
//! This library provides a code-search engine built on:
//! - Per-workspace tantivy inverted indexes with LRU eviction and
//!   stale-lock recovery
//! - A code-aware analysis pipeline (stop words, domain synonyms, stemming)
//! - Line-accurate hit mapping via stored term vectors and line-break arrays
//! - Token-budgeted response assembly with cached detail tokens
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              MCP Server (rmcp)              │
//! │         JSON-RPC over stdin/stdout          │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │               Tool Router                   │
//! │  add_workspace, index, search, details...   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │              Index Service                  │
//! │   workspace hash → IndexContext (LRU cap)   │
//! └───────┬──────────┬──────────┬───────────────┘
//!         │          │          │
//!    ┌────▼───┐ ┌────▼────┐ ┌───▼─────┐
//!    │tantivy │ │ line /  │ │response │
//!    │ index  │ │ type    │ │ builder │
//!    │ + lock │ │ context │ │ + cache │
//!    └────────┘ └─────────┘ └─────────┘
//! ```

#[doc(hidden)]
pub mod bench_utils;

pub mod analysis;
pub mod config;
pub mod error;
pub mod fmt;
pub mod index;
pub mod pressure;
pub mod response;
pub mod schema;
pub mod search;
pub mod security;
pub mod server;
pub mod supplier;
pub mod tools;
pub mod types;
pub mod workspace;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use index::{IndexService, SearchRequest};
pub use response::{DetailCache, ResponseBuilder, ResponseMode};
pub use types::{Ticks, WorkspaceHash};
