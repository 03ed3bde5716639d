//! knowbase - local knowledge base with semantic retrieval
//!
//! Ingests reference documents (PDF and plain text) and FAQ entries,
//! embeds their content through an OpenAI-compatible provider and
//! answers similarity queries over the stored vectors. Everything
//! lives in a single SQLite database plus a blob directory; there is
//! no external index service.
//!
//! # Architecture
//!
//! - **catalog**: document/FAQ lifecycle and CRUD
//! - **blob**: raw upload storage
//! - **ingest**: background pipeline (extract, chunk, embed, store)
//! - **extract**: format sniffing and text extraction
//! - **chunk**: boundary-aware splitting with overlap
//! - **embed**: embedding providers behind the `Embedder` trait
//! - **search**: cosine-similarity retrieval over chunks and FAQs
//! - **db**: SQLite persistence
//! - **config**: TOML configuration

pub mod blob;
pub mod catalog;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod extract;
pub mod faq;
pub mod ingest;
pub mod search;

pub use blob::{BlobStore, LocalBlobStore};
pub use catalog::{Catalog, CorpusStats, DocumentDetail, DocumentPage, Pagination};
pub use config::Config;
pub use db::{Database, Document, DocumentChunk, DocumentStatus, Faq};
pub use embed::{Embedder, MockEmbedder, OpenAiEmbedder};
pub use error::{Error, Result};
pub use faq::{EmbedAllStats, FaqEmbedder};
pub use ingest::{IngestPipeline, IngestQueue};
pub use search::{Corpus, RetrievalEngine, SearchHit, SearchOptions, SearchSource};
