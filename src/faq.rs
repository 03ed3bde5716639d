//! FAQ embedding generation
//!
//! FAQs are created without an embedding and made searchable by an
//! explicit embed pass. A failed FAQ simply stays unembedded; it can
//! be retried on the next pass.

use crate::db::Database;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of an embed-all pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbedAllStats {
    pub succeeded: usize,
    pub failed: usize,
}

/// Generates and stores FAQ embeddings
pub struct FaqEmbedder {
    db: Database,
    embedder: Arc<dyn Embedder>,
}

impl FaqEmbedder {
    pub fn new(db: Database, embedder: Arc<dyn Embedder>) -> Self {
        Self { db, embedder }
    }

    /// Embed a single FAQ over its question and answer text
    pub async fn embed_faq(&self, id: &str) -> Result<()> {
        let faq = self
            .db
            .get_faq(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("FAQ {}", id)))?;

        let vector = self
            .embedder
            .embed(&[faq.embedding_text()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("no vector returned for FAQ".to_string()))?;

        self.db.set_faq_embedding(id, &vector).await?;
        info!(faq = %id, "FAQ embedded");
        Ok(())
    }

    /// Embed every FAQ missing an embedding; with `force`, re-embed
    /// all of them. Per-FAQ failures are counted, not fatal.
    pub async fn embed_all(&self, force: bool) -> Result<EmbedAllStats> {
        let faqs = if force {
            self.db.list_faqs().await?
        } else {
            self.db.faqs_missing_embedding().await?
        };

        let mut stats = EmbedAllStats::default();
        for faq in faqs {
            match self.embed_faq(&faq.id).await {
                Ok(()) => stats.succeeded += 1,
                Err(e) => {
                    warn!(faq = %faq.id, "FAQ embedding failed: {}", e);
                    stats.failed += 1;
                }
            }
        }

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            "FAQ embed pass finished"
        );
        Ok(stats)
    }
}
