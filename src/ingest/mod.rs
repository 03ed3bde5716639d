//! Document ingestion pipeline
//!
//! Takes an uploaded document from `uploading` to `completed`:
//! fetch blob, extract text, chunk, embed, store chunks. Any failure
//! lands the document in `failed` with the reason recorded, and never
//! leaves partial chunks behind.

mod queue;

pub use queue::IngestQueue;

use crate::blob::BlobStore;
use crate::config::{ChunkConfig, EmbeddingConfig, IngestConfig};
use crate::db::{Database, DocumentChunk, DocumentMetadata};
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::{chunk, extract};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Runs ingestion for individual documents
pub struct IngestPipeline {
    db: Database,
    blobs: Arc<dyn BlobStore>,
    embedder: Arc<dyn Embedder>,
    chunk_config: ChunkConfig,
    embedding_config: EmbeddingConfig,
    ingest_config: IngestConfig,
}

impl IngestPipeline {
    pub fn new(
        db: Database,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<dyn Embedder>,
        chunk_config: ChunkConfig,
        embedding_config: EmbeddingConfig,
        ingest_config: IngestConfig,
    ) -> Self {
        Self {
            db,
            blobs,
            embedder,
            chunk_config,
            embedding_config,
            ingest_config,
        }
    }

    /// Ingest one document end to end.
    ///
    /// Claims the document first; if it is not in the `uploading`
    /// state (already claimed by another worker, or terminal) this is
    /// a logged no-op.
    pub async fn run(&self, document_id: &str) -> Result<()> {
        if !self.db.claim_for_processing(document_id).await? {
            let status = self
                .db
                .get_document(document_id)
                .await?
                .map(|d| d.status)
                .unwrap_or_else(|| "missing".to_string());
            warn!(document = %document_id, %status, "Skipping ingestion, document not claimable");
            return Ok(());
        }

        info!(document = %document_id, "Ingesting document");

        match self.process(document_id).await {
            Ok(metadata) => {
                self.db.mark_completed(document_id, &metadata).await?;
                info!(document = %document_id, "Ingestion complete");
                Ok(())
            }
            Err(e) => {
                error!(document = %document_id, "Ingestion failed: {}", e);
                // drop any chunks written before the failure
                if let Err(cleanup) = self.db.delete_chunks(document_id).await {
                    error!(document = %document_id, "Chunk cleanup failed: {}", cleanup);
                }
                let metadata = DocumentMetadata {
                    failure_reason: Some(e.to_string()),
                    ..Default::default()
                };
                self.db.mark_failed(document_id, &metadata).await?;
                Err(e)
            }
        }
    }

    async fn process(&self, document_id: &str) -> Result<DocumentMetadata> {
        let doc = self
            .db
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;

        let bytes = self.blobs.get(&doc.filename).await?;

        let extraction = extract::extract_text(
            &bytes,
            doc.mime_type.as_deref(),
            Duration::from_secs(self.ingest_config.extract_timeout_secs),
        )
        .await?;

        let pieces = chunk::split(&extraction.text, &self.chunk_config);
        if pieces.is_empty() {
            return Err(Error::EmptyExtraction);
        }
        info!(document = %document_id, chunks = pieces.len(), "Chunked document");

        let vectors = embed_in_batches(
            self.embedder.as_ref(),
            &pieces,
            self.embedding_config.batch_size,
        )
        .await?;

        let chunks: Vec<DocumentChunk> = pieces
            .into_iter()
            .zip(vectors.iter())
            .enumerate()
            .map(|(i, (content, vector))| {
                DocumentChunk::new(document_id.to_string(), i as i64, content, vector)
            })
            .collect();

        self.db.replace_chunks(document_id, &chunks).await?;

        Ok(DocumentMetadata {
            failure_reason: None,
            page_count: extraction.page_count,
            extraction_warnings: extraction.warnings,
        })
    }
}
