//! Command implementations for the CLI
//!
//! Each `cmd_*` function does the work and returns data; the
//! `print_*` helpers render it for humans. JSON output is handled by
//! the caller.

use crate::blob::{BlobStore, LocalBlobStore};
use crate::catalog::{Catalog, CorpusStats, DocumentDetail, DocumentPage};
use crate::config::Config;
use crate::db::{Database, Document, DocumentFilter, DocumentStatus, Faq};
use crate::embed::{Embedder, MockEmbedder, OpenAiEmbedder};
use crate::error::{Error, Result};
use crate::faq::{EmbedAllStats, FaqEmbedder};
use crate::ingest::{IngestPipeline, IngestQueue};
use crate::search::{Corpus, RetrievalEngine, SearchHit, SearchOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Everything a command needs, built once in main
pub struct App {
    pub config: Config,
    pub db: Database,
    pub blobs: Arc<dyn BlobStore>,
    pub embedder: Arc<dyn Embedder>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::new(&config.paths.db_file).await?;
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.paths.blob_dir));
        let embedder = build_embedder(&config)?;
        info!(
            model = embedder.model_name(),
            dimension = embedder.dimension(),
            "Embedding backend ready"
        );
        Ok(Self {
            config,
            db,
            blobs,
            embedder,
        })
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.db.clone(), Arc::clone(&self.blobs))
    }

    fn pipeline(&self) -> Arc<IngestPipeline> {
        Arc::new(IngestPipeline::new(
            self.db.clone(),
            Arc::clone(&self.blobs),
            Arc::clone(&self.embedder),
            self.config.chunk.clone(),
            self.config.embedding.clone(),
            self.config.ingest.clone(),
        ))
    }

    /// One-shot queue for CLI commands: enqueue, then drain
    async fn run_ingestion(&self, document_ids: Vec<String>) -> Result<()> {
        let queue = IngestQueue::start(
            self.pipeline(),
            self.config.ingest.workers,
            self.config.ingest.queue_capacity,
        );
        for id in document_ids {
            queue.enqueue(id).await?;
        }
        queue.shutdown().await;
        Ok(())
    }
}

/// Pick the embedding backend from config. The model name `mock`
/// selects the deterministic offline embedder.
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    if config.embedding.model == "mock" {
        return Ok(Arc::new(MockEmbedder::new(config.embedding.dimension)));
    }
    Ok(Arc::new(OpenAiEmbedder::new(&config.embedding)?))
}

/// Initialize config file, database and blob directory
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<()> {
    let base = base_dir.unwrap_or_else(Config::default_base_dir);
    let config_path = base.join("config.toml");

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "config already exists at {}",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.set_base_dir(base);
    config.save(&config_path)?;

    std::fs::create_dir_all(&config.paths.blob_dir)?;
    Database::new(&config.paths.db_file).await?;

    info!("Initialized knowledge base at {:?}", config.paths.base_dir);
    Ok(())
}

/// Upload a local file and ingest it
pub async fn cmd_add(app: &App, path: &Path, title: Option<String>) -> Result<DocumentDetail> {
    let bytes = std::fs::read(path)?;
    let original_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Config(format!("bad file name: {}", path.display())))?;
    let declared_mime = mime_guess::from_path(path).first().map(|m| m.to_string());

    let catalog = app.catalog();
    let doc = catalog
        .upload(&bytes, original_name, declared_mime, title)
        .await?;

    app.run_ingestion(vec![doc.id.clone()]).await?;
    catalog.get_document(&doc.id).await
}

pub async fn cmd_list(
    app: &App,
    status: Option<DocumentStatus>,
    active_only: bool,
    limit: i64,
    offset: i64,
) -> Result<DocumentPage> {
    let filter = DocumentFilter {
        status,
        active_only,
    };
    app.catalog().list_documents(&filter, limit, offset).await
}

pub async fn cmd_show(app: &App, id: &str) -> Result<DocumentDetail> {
    app.catalog().get_document(id).await
}

/// Stored chunks of a document, in index order
pub async fn cmd_chunks(app: &App, id: &str) -> Result<Vec<crate::db::DocumentChunk>> {
    // surface NotFound for unknown ids instead of an empty list
    app.catalog().get_document(id).await?;
    app.catalog().get_chunks(id).await
}

pub async fn cmd_update(
    app: &App,
    id: &str,
    title: Option<String>,
    is_active: Option<bool>,
) -> Result<Document> {
    app.catalog().update_document(id, title, is_active).await
}

pub async fn cmd_remove(app: &App, id: &str) -> Result<()> {
    app.catalog().delete_document(id).await
}

/// Reset a failed document and run ingestion again
pub async fn cmd_retry(app: &App, id: &str) -> Result<DocumentDetail> {
    let catalog = app.catalog();
    let doc = catalog.reset_failed(id).await?;
    app.run_ingestion(vec![doc.id.clone()]).await?;
    catalog.get_document(id).await
}

pub async fn cmd_search(
    app: &App,
    query: &str,
    corpus: Corpus,
    limit: Option<usize>,
    min_score: Option<f32>,
) -> Result<Vec<SearchHit>> {
    let engine = RetrievalEngine::new(
        app.db.clone(),
        Arc::clone(&app.embedder),
        app.config.search.clone(),
    );
    engine
        .search(
            query,
            &SearchOptions {
                corpus,
                top_k: limit,
                min_score,
            },
        )
        .await
}

pub async fn cmd_stats(app: &App) -> Result<CorpusStats> {
    app.catalog().stats().await
}

// ===== FAQs =====

/// Create a FAQ and embed it right away
pub async fn cmd_faq_add(app: &App, question: String, answer: String) -> Result<Faq> {
    let catalog = app.catalog();
    let faq = catalog.create_faq(question, answer).await?;

    let embedder = FaqEmbedder::new(app.db.clone(), Arc::clone(&app.embedder));
    if let Err(e) = embedder.embed_faq(&faq.id).await {
        // the FAQ exists either way; 'faq embed' can pick it up later
        tracing::warn!(faq = %faq.id, "Initial FAQ embedding failed: {}", e);
    }
    catalog.get_faq(&faq.id).await
}

pub async fn cmd_faq_list(app: &App) -> Result<Vec<Faq>> {
    app.catalog().list_faqs().await
}

pub async fn cmd_faq_update(
    app: &App,
    id: &str,
    question: Option<String>,
    answer: Option<String>,
    is_active: Option<bool>,
) -> Result<Faq> {
    app.catalog().update_faq(id, question, answer, is_active).await
}

pub async fn cmd_faq_remove(app: &App, id: &str) -> Result<()> {
    app.catalog().delete_faq(id).await
}

/// Embed one FAQ, or all (missing or forced)
pub async fn cmd_faq_embed(app: &App, id: Option<&str>, force: bool) -> Result<EmbedAllStats> {
    let embedder = FaqEmbedder::new(app.db.clone(), Arc::clone(&app.embedder));
    match id {
        Some(id) => {
            embedder.embed_faq(id).await?;
            Ok(EmbedAllStats {
                succeeded: 1,
                failed: 0,
            })
        }
        None => embedder.embed_all(force).await,
    }
}

// ===== Output helpers =====

pub fn print_documents(page: &DocumentPage) {
    if page.documents.is_empty() {
        println!("No documents.");
        return;
    }
    for doc in &page.documents {
        println!(
            "{}  [{}{}]  {}",
            doc.id,
            doc.status,
            if doc.is_active { "" } else { ", inactive" },
            doc.title.as_deref().unwrap_or(&doc.original_name),
        );
    }
    let p = &page.pagination;
    println!(
        "\nShowing {} of {} (offset {}){}",
        page.documents.len(),
        p.total,
        p.offset,
        if p.has_more { ", more available" } else { "" }
    );
}

pub fn print_document(detail: &DocumentDetail) {
    let doc = &detail.document;
    println!("ID:        {}", doc.id);
    println!(
        "Title:     {}",
        doc.title.as_deref().unwrap_or(&doc.original_name)
    );
    println!("File:      {} ({} bytes)", doc.original_name, doc.size);
    println!("Status:    {}", doc.status);
    println!("Active:    {}", doc.is_active);
    println!("Chunks:    {}", detail.chunk_count);
    println!("Created:   {}", doc.created_at);

    let metadata = doc.metadata();
    if let Some(pages) = metadata.page_count {
        println!("Pages:     {}", pages);
    }
    if let Some(reason) = &metadata.failure_reason {
        println!("Failure:   {}", reason);
    }
    for warning in &metadata.extraction_warnings {
        println!("Warning:   {}", warning);
    }
}

pub fn print_chunks(chunks: &[crate::db::DocumentChunk]) {
    if chunks.is_empty() {
        println!("No chunks.");
        return;
    }
    for chunk in chunks {
        println!("--- chunk {} ({} chars)", chunk.chunk_index, chunk.content.len());
        println!("{}", chunk.content);
    }
}

pub fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No matches.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        match &hit.source {
            crate::search::SearchSource::Document {
                id,
                title,
                chunk_index,
            } => {
                println!(
                    "{}. [{:.3}] document {} (chunk {})",
                    i + 1,
                    hit.score,
                    title.as_deref().unwrap_or(id),
                    chunk_index
                );
            }
            crate::search::SearchSource::Faq { question, .. } => {
                println!("{}. [{:.3}] FAQ: {}", i + 1, hit.score, question);
            }
        }
        for line in hit.text.lines().take(3) {
            println!("   {}", line);
        }
        println!();
    }
}

pub fn print_faqs(faqs: &[Faq]) {
    if faqs.is_empty() {
        println!("No FAQs.");
        return;
    }
    for faq in faqs {
        println!(
            "{}  [{}{}]",
            faq.id,
            if faq.embedding.is_some() {
                "embedded"
            } else {
                "not embedded"
            },
            if faq.is_active { "" } else { ", inactive" },
        );
        println!("  Q: {}", faq.question);
        println!("  A: {}", faq.answer);
    }
}

pub fn print_stats(stats: &CorpusStats) {
    println!("Documents: {} ({} searchable)", stats.documents, stats.searchable_documents);
    for (status, count) in &stats.by_status {
        println!("  {}: {}", status, count);
    }
    println!("Chunks:    {}", stats.chunks);
    println!("FAQs:      {}", stats.faqs);
    println!("Storage:   {} bytes", stats.total_size_bytes);
}

pub fn print_embed_stats(stats: &EmbedAllStats) {
    println!(
        "✓ Embedded {} FAQ(s), {} failed",
        stats.succeeded, stats.failed
    );
}
