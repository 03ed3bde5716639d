//! Knowledge-base catalog
//!
//! CRUD surface over documents and FAQs, coordinating the database
//! and the blob store. Ingestion itself is the pipeline's job; the
//! catalog only stages uploads and manages lifecycle.

use crate::blob::BlobStore;
use crate::db::{Database, Document, DocumentChunk, DocumentFilter, DocumentStatus, Faq};
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Pagination info returned with listings
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

/// One page of documents
#[derive(Debug, Clone, Serialize)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub pagination: Pagination,
}

/// A document together with its chunk count
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub chunk_count: i64,
}

/// Corpus-wide statistics
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub documents: i64,
    /// Completed and active, i.e. eligible for retrieval
    pub searchable_documents: i64,
    pub by_status: Vec<(String, i64)>,
    pub total_size_bytes: i64,
    pub chunks: i64,
    pub faqs: i64,
}

/// Document and FAQ management
pub struct Catalog {
    db: Database,
    blobs: Arc<dyn BlobStore>,
}

impl Catalog {
    pub fn new(db: Database, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    // ===== Documents =====

    /// Stage an upload: store the bytes and create the document row
    /// in the `uploading` state. Ingestion is triggered separately.
    pub async fn upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        declared_mime: Option<String>,
        title: Option<String>,
    ) -> Result<Document> {
        let key = self.blobs.put(bytes, original_name).await?;

        let title = title.or_else(|| Some(default_title(original_name)));
        let doc = Document::new(
            key,
            original_name.to_string(),
            declared_mime,
            bytes.len() as i64,
            title,
        );
        self.db.insert_document(&doc).await?;

        info!(document = %doc.id, name = %doc.original_name, size = doc.size, "Document uploaded");
        Ok(doc)
    }

    pub async fn get_document(&self, id: &str) -> Result<DocumentDetail> {
        let document = self
            .db
            .get_document(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;
        let chunk_count = self.db.count_chunks(id).await?;
        Ok(DocumentDetail {
            document,
            chunk_count,
        })
    }

    pub async fn list_documents(
        &self,
        filter: &DocumentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<DocumentPage> {
        let limit = limit.clamp(1, 500);
        let offset = offset.max(0);

        let documents = self.db.list_documents(filter, limit, offset).await?;
        let total = self.db.count_documents(filter).await?;

        Ok(DocumentPage {
            documents,
            pagination: Pagination {
                total,
                limit,
                offset,
                has_more: offset + limit < total,
            },
        })
    }

    pub async fn update_document(
        &self,
        id: &str,
        title: Option<String>,
        is_active: Option<bool>,
    ) -> Result<Document> {
        self.db.update_document(id, title, is_active).await
    }

    /// Delete a document, its chunks and its blob.
    ///
    /// Order matters: chunks go first so a half-finished delete never
    /// leaves searchable chunks behind. A blob that cannot be removed
    /// is logged and skipped rather than blocking the delete.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let doc = self
            .db
            .get_document(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;

        let removed = self.db.delete_chunks(id).await?;
        if let Err(e) = self.blobs.delete(&doc.filename).await {
            warn!(document = %id, blob = %doc.filename, "Blob delete failed: {}", e);
        }
        self.db.delete_document(id).await?;

        info!(document = %id, chunks = removed, "Document deleted");
        Ok(())
    }

    /// Re-queue a failed document by resetting it to `uploading`.
    /// The caller enqueues it afterwards.
    pub async fn reset_failed(&self, id: &str) -> Result<Document> {
        if !self.db.reset_for_retry(id).await? {
            let doc = self
                .db
                .get_document(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;
            return Err(Error::InvalidState(format!(
                "document {} is {}, only failed documents can be retried",
                id, doc.status
            )));
        }
        self.db
            .get_document(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))
    }

    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        self.db.get_chunks(document_id).await
    }

    pub async fn stats(&self) -> Result<CorpusStats> {
        Ok(CorpusStats {
            documents: self.db.count_documents(&DocumentFilter::default()).await?,
            searchable_documents: self.searchable_document_count().await?,
            by_status: self.db.status_counts().await?,
            total_size_bytes: self.db.total_document_size().await?,
            chunks: self.db.count_all_chunks().await?,
            faqs: self.db.count_faqs().await?,
        })
    }

    // ===== FAQs =====

    pub async fn create_faq(&self, question: String, answer: String) -> Result<Faq> {
        if question.trim().is_empty() || answer.trim().is_empty() {
            return Err(Error::InvalidState(
                "FAQ question and answer must be non-empty".to_string(),
            ));
        }
        let faq = Faq::new(question, answer);
        self.db.insert_faq(&faq).await?;
        info!(faq = %faq.id, "FAQ created");
        Ok(faq)
    }

    pub async fn get_faq(&self, id: &str) -> Result<Faq> {
        self.db
            .get_faq(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("FAQ {}", id)))
    }

    pub async fn list_faqs(&self) -> Result<Vec<Faq>> {
        self.db.list_faqs().await
    }

    pub async fn update_faq(
        &self,
        id: &str,
        question: Option<String>,
        answer: Option<String>,
        is_active: Option<bool>,
    ) -> Result<Faq> {
        self.db.update_faq(id, question, answer, is_active).await
    }

    pub async fn delete_faq(&self, id: &str) -> Result<()> {
        self.db.delete_faq(id).await?;
        info!(faq = %id, "FAQ deleted");
        Ok(())
    }

    /// Documents currently eligible for retrieval
    pub async fn searchable_document_count(&self) -> Result<i64> {
        self.db
            .count_documents(&DocumentFilter {
                status: Some(DocumentStatus::Completed),
                active_only: true,
            })
            .await
    }
}

/// Default title: original file name without its extension
fn default_title(original_name: &str) -> String {
    Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(original_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_title_strips_extension() {
        assert_eq!(default_title("return-policy.pdf"), "return-policy");
        assert_eq!(default_title("notes"), "notes");
        assert_eq!(default_title("archive.tar.gz"), "archive.tar");
    }

    mod lifecycle {
        use super::super::*;
        use crate::blob::LocalBlobStore;
        use crate::db::DocumentChunk;
        use tempfile::TempDir;

        async fn setup() -> (Catalog, Database, Arc<dyn BlobStore>, TempDir) {
            let tmp = TempDir::new().unwrap();
            let db = Database::new(&tmp.path().join("test.db")).await.unwrap();
            let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(tmp.path().join("blobs")));
            (Catalog::new(db.clone(), Arc::clone(&blobs)), db, blobs, tmp)
        }

        #[tokio::test]
        async fn test_upload_stages_document() {
            let (catalog, _db, blobs, _tmp) = setup().await;

            let doc = catalog
                .upload(b"content", "handbook.pdf", Some("application/pdf".into()), None)
                .await
                .unwrap();

            assert_eq!(doc.get_status().unwrap(), DocumentStatus::Uploading);
            assert_eq!(doc.title.as_deref(), Some("handbook"));
            assert_eq!(doc.size, 7);
            assert_eq!(blobs.get(&doc.filename).await.unwrap(), b"content");
        }

        #[tokio::test]
        async fn test_delete_removes_chunks_blob_and_row() {
            let (catalog, db, blobs, _tmp) = setup().await;

            let doc = catalog.upload(b"bytes", "doc.txt", None, None).await.unwrap();
            let chunk = DocumentChunk::new(doc.id.clone(), 0, "text".to_string(), &[1.0]);
            db.replace_chunks(&doc.id, &[chunk]).await.unwrap();

            catalog.delete_document(&doc.id).await.unwrap();

            assert!(db.get_document(&doc.id).await.unwrap().is_none());
            assert_eq!(db.count_chunks(&doc.id).await.unwrap(), 0);
            assert!(matches!(
                blobs.get(&doc.filename).await,
                Err(Error::NotFound(_))
            ));
        }

        #[tokio::test]
        async fn test_delete_missing_document_is_not_found() {
            let (catalog, _db, _blobs, _tmp) = setup().await;
            assert!(matches!(
                catalog.delete_document("nope").await,
                Err(Error::NotFound(_))
            ));
        }

        #[tokio::test]
        async fn test_stats_reflect_corpus() {
            let (catalog, db, _blobs, _tmp) = setup().await;

            let doc = catalog.upload(b"12345", "a.txt", None, None).await.unwrap();
            let chunk = DocumentChunk::new(doc.id.clone(), 0, "text".to_string(), &[1.0]);
            db.replace_chunks(&doc.id, &[chunk]).await.unwrap();
            catalog
                .create_faq("q".to_string(), "a".to_string())
                .await
                .unwrap();

            let stats = catalog.stats().await.unwrap();
            assert_eq!(stats.documents, 1);
            assert_eq!(stats.searchable_documents, 0);
            assert_eq!(stats.chunks, 1);
            assert_eq!(stats.faqs, 1);
            assert_eq!(stats.total_size_bytes, 5);
            assert_eq!(stats.by_status, vec![("uploading".to_string(), 1)]);

            db.claim_for_processing(&doc.id).await.unwrap();
            db.mark_completed(&doc.id, &crate::db::DocumentMetadata::default())
                .await
                .unwrap();
            let stats = catalog.stats().await.unwrap();
            assert_eq!(stats.searchable_documents, 1);
        }

        #[tokio::test]
        async fn test_get_chunks_in_index_order() {
            let (catalog, db, _blobs, _tmp) = setup().await;

            let doc = catalog.upload(b"bytes", "b.txt", None, None).await.unwrap();
            let rows: Vec<DocumentChunk> = (0..3)
                .map(|i| DocumentChunk::new(doc.id.clone(), i, format!("part {}", i), &[1.0]))
                .collect();
            db.replace_chunks(&doc.id, &rows).await.unwrap();

            let loaded = catalog.get_chunks(&doc.id).await.unwrap();
            assert_eq!(loaded.len(), 3);
            assert_eq!(loaded[2].content, "part 2");
        }

        #[tokio::test]
        async fn test_blank_faq_rejected() {
            let (catalog, _db, _blobs, _tmp) = setup().await;
            assert!(matches!(
                catalog.create_faq("  ".to_string(), "a".to_string()).await,
                Err(Error::InvalidState(_))
            ));
        }
    }
}
