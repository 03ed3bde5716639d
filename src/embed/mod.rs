//! Embedding generation
//!
//! The pipeline and retrieval engine only depend on the [`Embedder`]
//! trait. The default implementation talks to an OpenAI-compatible
//! HTTP endpoint; a deterministic mock is provided for tests and
//! offline use.

mod mock;
mod openai_http;

pub use mock::MockEmbedder;
pub use openai_http::OpenAiEmbedder;

use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Generates embedding vectors for batches of text
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of the vectors this embedder produces
    fn dimension(&self) -> usize;

    /// Model identifier, for logs and status output
    fn model_name(&self) -> &str;
}

/// Embed texts in provider-sized batches, preserving input order.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let mut batch_vectors = embedder.embed(batch).await?;
        if batch_vectors.len() != batch.len() {
            return Err(Error::Provider(format!(
                "provider returned {} vectors for {} inputs",
                batch_vectors.len(),
                batch.len()
            )));
        }
        vectors.append(&mut batch_vectors);
    }

    debug!(texts = texts.len(), batches = texts.len().div_ceil(batch_size), "Embedded texts");
    Ok(vectors)
}
