//! Semantic retrieval over document chunks and FAQs
//!
//! Embeds the query, scans stored vectors with cosine similarity,
//! filters by a score floor and returns the top matches. All vectors
//! live in SQLite rows; there is no separate index to keep in sync.

use crate::config::SearchConfig;
use crate::db::Database;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which corpus to search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Corpus {
    Documents,
    Faqs,
    #[default]
    Both,
}

impl Corpus {
    fn includes_documents(self) -> bool {
        matches!(self, Corpus::Documents | Corpus::Both)
    }

    fn includes_faqs(self) -> bool {
        matches!(self, Corpus::Faqs | Corpus::Both)
    }
}

/// Origin of a search hit
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchSource {
    Document {
        id: String,
        title: Option<String>,
        chunk_index: i64,
    },
    Faq {
        id: String,
        question: String,
    },
}

/// A single search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub source: SearchSource,
    pub text: String,
    pub score: f32,
}

/// Options for one search call; unset fields fall back to config
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub corpus: Corpus,
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
}

/// Cosine similarity between two vectors.
///
/// Mismatched lengths or a zero-norm operand score 0 instead of
/// erroring, so one bad stored vector cannot poison a search.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// In-process retrieval engine
pub struct RetrievalEngine {
    db: Database,
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
}

impl RetrievalEngine {
    pub fn new(db: Database, embedder: Arc<dyn Embedder>, config: SearchConfig) -> Self {
        Self {
            db,
            embedder,
            config,
        }
    }

    /// Run a semantic search
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidState("empty search query".to_string()));
        }

        let top_k = options.top_k.unwrap_or(self.config.top_k);
        let min_score = options.min_score.unwrap_or(self.config.min_score);

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("no vector returned for query".to_string()))?;

        // (hit, created_at) so ties break toward fresher content
        let mut scored: Vec<(SearchHit, String)> = Vec::new();

        if options.corpus.includes_documents() {
            for candidate in self.db.chunk_candidates().await? {
                let vector: Vec<f32> = match serde_json::from_str(&candidate.embedding) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(chunk = %candidate.id, "Skipping unparseable stored embedding: {}", e);
                        continue;
                    }
                };
                let score = cosine_similarity(&query_vec, &vector);
                if score >= min_score {
                    scored.push((
                        SearchHit {
                            source: SearchSource::Document {
                                id: candidate.document_id,
                                title: candidate.document_title,
                                chunk_index: candidate.chunk_index,
                            },
                            text: candidate.content,
                            score,
                        },
                        candidate.created_at,
                    ));
                }
            }
        }

        if options.corpus.includes_faqs() {
            for faq in self.db.faq_candidates().await? {
                let Some(vector) = faq.embedding_vec() else {
                    warn!(faq = %faq.id, "Skipping unparseable stored embedding");
                    continue;
                };
                let score = cosine_similarity(&query_vec, &vector);
                if score >= min_score {
                    let text = format!("Q: {}\nA: {}", faq.question, faq.answer);
                    // updated_at moves on edit and re-embed, so it is
                    // the freshness signal for FAQs
                    scored.push((
                        SearchHit {
                            source: SearchSource::Faq {
                                id: faq.id,
                                question: faq.question,
                            },
                            text,
                            score,
                        },
                        faq.updated_at,
                    ));
                }
            }
        }

        scored.sort_by(|(a, a_ts), (b, b_ts)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b_ts.cmp(a_ts))
        });
        scored.truncate(top_k);

        debug!(query_chars = query.len(), hits = scored.len(), "Search complete");
        Ok(scored.into_iter().map(|(hit, _)| hit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![0.5, 0.5, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let score = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    mod engine {
        use super::super::*;
        use crate::db::{DocumentChunk, DocumentMetadata, Faq};
        use crate::embed::MockEmbedder;
        use tempfile::TempDir;

        struct Fixture {
            db: Database,
            embedder: Arc<MockEmbedder>,
            _tmp: TempDir,
        }

        async fn setup() -> Fixture {
            let tmp = TempDir::new().unwrap();
            let db = Database::new(&tmp.path().join("test.db")).await.unwrap();
            Fixture {
                db,
                embedder: Arc::new(MockEmbedder::new(256)),
                _tmp: tmp,
            }
        }

        impl Fixture {
            fn engine(&self) -> RetrievalEngine {
                RetrievalEngine::new(
                    self.db.clone(),
                    self.embedder.clone(),
                    SearchConfig {
                        top_k: 5,
                        min_score: 0.1,
                    },
                )
            }

            async fn add_completed_document(&self, name: &str, chunks: &[&str]) -> String {
                let doc = crate::db::Document::new(
                    format!("{}.blob", name),
                    format!("{}.txt", name),
                    None,
                    100,
                    Some(name.to_string()),
                );
                self.db.insert_document(&doc).await.unwrap();

                let texts: Vec<String> = chunks.iter().map(|s| s.to_string()).collect();
                let vectors = self.embedder.embed(&texts).await.unwrap();
                let rows: Vec<DocumentChunk> = texts
                    .into_iter()
                    .zip(vectors)
                    .enumerate()
                    .map(|(i, (content, v))| {
                        DocumentChunk::new(doc.id.clone(), i as i64, content, &v)
                    })
                    .collect();
                self.db.replace_chunks(&doc.id, &rows).await.unwrap();

                self.db.claim_for_processing(&doc.id).await.unwrap();
                self.db
                    .mark_completed(&doc.id, &DocumentMetadata::default())
                    .await
                    .unwrap();
                doc.id
            }

            async fn add_embedded_faq(&self, question: &str, answer: &str) -> String {
                let faq = Faq::new(question.to_string(), answer.to_string());
                self.db.insert_faq(&faq).await.unwrap();
                let vectors = self.embedder.embed(&[faq.embedding_text()]).await.unwrap();
                self.db.set_faq_embedding(&faq.id, &vectors[0]).await.unwrap();
                faq.id
            }
        }

        #[tokio::test]
        async fn test_exact_faq_question_ranks_first() {
            let f = setup().await;
            f.add_completed_document(
                "shipping-guide",
                &["carrier selection depends on package weight and distance"],
            )
            .await;
            f.add_embedded_faq("how long does shipping take", "three to five business days")
                .await;
            f.add_embedded_faq("can I return an item", "within thirty days")
                .await;

            let hits = f
                .engine()
                .search("how long does shipping take", &SearchOptions::default())
                .await
                .unwrap();

            assert!(!hits.is_empty());
            match &hits[0].source {
                SearchSource::Faq { question, .. } => {
                    assert_eq!(question, "how long does shipping take")
                }
                other => panic!("expected FAQ hit first, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_corpus_filter() {
            let f = setup().await;
            f.add_completed_document("doc", &["shipping details for parcels"]).await;
            f.add_embedded_faq("shipping question", "shipping answer").await;

            let doc_hits = f
                .engine()
                .search(
                    "shipping",
                    &SearchOptions {
                        corpus: Corpus::Documents,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert!(doc_hits
                .iter()
                .all(|h| matches!(h.source, SearchSource::Document { .. })));

            let faq_hits = f
                .engine()
                .search(
                    "shipping",
                    &SearchOptions {
                        corpus: Corpus::Faqs,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert!(faq_hits
                .iter()
                .all(|h| matches!(h.source, SearchSource::Faq { .. })));
        }

        #[tokio::test]
        async fn test_deleted_document_never_surfaces() {
            let f = setup().await;
            let id = f
                .add_completed_document("temp", &["unique pangolin content here"])
                .await;

            let hits = f
                .engine()
                .search("unique pangolin content", &SearchOptions::default())
                .await
                .unwrap();
            assert_eq!(hits.len(), 1);

            // delete in pipeline order: chunks first, then the row
            f.db.delete_chunks(&id).await.unwrap();
            f.db.delete_document(&id).await.unwrap();

            let hits = f
                .engine()
                .search("unique pangolin content", &SearchOptions::default())
                .await
                .unwrap();
            assert!(hits.is_empty());
        }

        #[tokio::test]
        async fn test_score_floor_and_top_k() {
            let f = setup().await;
            for i in 0..8 {
                f.add_completed_document(
                    &format!("doc-{}", i),
                    &["shipping carriers and shipping costs"],
                )
                .await;
            }

            let hits = f
                .engine()
                .search(
                    "shipping",
                    &SearchOptions {
                        top_k: Some(3),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(hits.len(), 3);

            let hits = f
                .engine()
                .search(
                    "shipping",
                    &SearchOptions {
                        min_score: Some(0.999),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert!(hits.is_empty());
        }

        #[tokio::test]
        async fn test_faq_ties_break_toward_most_recently_updated() {
            let f = setup().await;

            // identical text, so both score identically
            let first = Faq::new("shipping cost".to_string(), "flat rate".to_string());
            let second = Faq::new("shipping cost".to_string(), "flat rate".to_string());
            f.db.insert_faq(&first).await.unwrap();
            f.db.insert_faq(&second).await.unwrap();

            let vectors = f.embedder.embed(&[first.embedding_text()]).await.unwrap();
            // embed the older FAQ last, giving it the fresher updated_at
            f.db.set_faq_embedding(&second.id, &vectors[0]).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            f.db.set_faq_embedding(&first.id, &vectors[0]).await.unwrap();

            let hits = f
                .engine()
                .search("shipping cost", &SearchOptions::default())
                .await
                .unwrap();

            assert_eq!(hits.len(), 2);
            assert!((hits[0].score - hits[1].score).abs() < 1e-6);
            match &hits[0].source {
                SearchSource::Faq { id, .. } => assert_eq!(id, &first.id),
                other => panic!("expected FAQ hit, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_empty_query_rejected() {
            let f = setup().await;
            let err = f
                .engine()
                .search("   ", &SearchOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidState(_)));
        }
    }
}
