//! Knowledge-base storage using SQLite
//!
//! This module handles all persistent state:
//! - Documents (uploaded reference files and their lifecycle status)
//! - Document chunks (embedded text fragments)
//! - FAQs (question/answer pairs with optional embeddings)
//!
//! Embeddings are stored as JSON-encoded float arrays in the row they
//! belong to; there is no separate vector index.

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Uploading => write!(f, "uploading"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Completed => write!(f, "completed"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uploading" => Ok(DocumentStatus::Uploading),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            _ => Err(Error::Config(format!("Unknown document status: {}", s))),
        }
    }
}

/// Structured document metadata stored alongside the row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    /// Human-readable reason for a failed ingestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Page count reported by the extractor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,

    /// Non-fatal extraction warnings (e.g. declared MIME mismatch)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extraction_warnings: Vec<String>,
}

/// An uploaded reference document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Blob store key of the original file
    pub filename: String,
    pub original_name: String,
    pub title: Option<String>,
    /// Caller-declared MIME type (the extractor sniffs the real one)
    pub mime_type: Option<String>,
    pub size: i64,
    pub status: String,
    pub is_active: bool,
    pub metadata_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn new(
        filename: String,
        original_name: String,
        mime_type: Option<String>,
        size: i64,
        title: Option<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            filename,
            original_name,
            title,
            mime_type,
            size,
            status: DocumentStatus::Uploading.to_string(),
            is_active: true,
            metadata_json: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn get_status(&self) -> Result<DocumentStatus> {
        self.status.parse()
    }

    /// Decode the structured metadata, defaulting on absence
    pub fn metadata(&self) -> DocumentMetadata {
        self.metadata_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default()
    }
}

/// An embedded text fragment of a document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    /// JSON-encoded f32 vector
    pub embedding: String,
    pub created_at: String,
}

impl DocumentChunk {
    pub fn new(document_id: String, chunk_index: i64, content: String, embedding: &[f32]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            chunk_index,
            content,
            embedding: encode_embedding(embedding),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn embedding_vec(&self) -> Result<Vec<f32>> {
        Ok(serde_json::from_str(&self.embedding)?)
    }
}

/// A FAQ entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Faq {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub is_active: bool,
    /// JSON-encoded f32 vector over question + answer, if generated
    pub embedding: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Faq {
    pub fn new(question: String, answer: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            question,
            answer,
            is_active: true,
            embedding: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Text the embedding is computed over
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.question, self.answer)
    }

    pub fn embedding_vec(&self) -> Option<Vec<f32>> {
        self.embedding
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
    }
}

/// A chunk joined with its owning document, as a retrieval candidate
#[derive(Debug, Clone, FromRow)]
pub struct ChunkCandidate {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: String,
    pub created_at: String,
    pub document_title: Option<String>,
}

/// Filter for document listings
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub active_only: bool,
}

fn encode_embedding(vector: &[f32]) -> String {
    serde_json::to_string(vector).unwrap_or_else(|_| "[]".to_string())
}

/// Knowledge-base database handle
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and auto-initialize) the database at the given path
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='documents'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Document Operations =====

    /// Insert a new document row
    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, filename, original_name, title, mime_type, size, status, is_active, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(&doc.original_name)
        .bind(&doc.title)
        .bind(&doc.mime_type)
        .bind(doc.size)
        .bind(&doc.status)
        .bind(doc.is_active)
        .bind(&doc.metadata_json)
        .bind(&doc.created_at)
        .bind(&doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get document by ID
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// List documents matching a filter, newest first
    pub async fn list_documents(
        &self,
        filter: &DocumentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>> {
        let mut sql = String::from("SELECT * FROM documents");
        let mut clauses = Vec::new();
        if filter.status.is_some() {
            clauses.push("status = ?");
        }
        if filter.active_only {
            clauses.push("is_active = 1");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, Document>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.to_string());
        }
        let docs = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;
        Ok(docs)
    }

    /// Count documents matching a filter
    pub async fn count_documents(&self, filter: &DocumentFilter) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM documents");
        let mut clauses = Vec::new();
        if filter.status.is_some() {
            clauses.push("status = ?");
        }
        if filter.active_only {
            clauses.push("is_active = 1");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.to_string());
        }
        Ok(query.fetch_one(&self.pool).await?)
    }

    /// Update user-editable fields; never touches status or chunks
    pub async fn update_document(
        &self,
        id: &str,
        title: Option<String>,
        is_active: Option<bool>,
    ) -> Result<Document> {
        let existing = self
            .get_document(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;

        let title = title.or(existing.title);
        let is_active = is_active.unwrap_or(existing.is_active);

        sqlx::query("UPDATE documents SET title = ?, is_active = ?, updated_at = ? WHERE id = ?")
            .bind(&title)
            .bind(is_active)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.get_document(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))
    }

    /// Claim a document for processing. Returns false if it is not in
    /// the uploading state (already claimed or terminal).
    pub async fn claim_for_processing(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(DocumentStatus::Processing.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(DocumentStatus::Uploading.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Mark a processing document completed, recording extraction metadata
    pub async fn mark_completed(&self, id: &str, metadata: &DocumentMetadata) -> Result<()> {
        self.mark_terminal(id, DocumentStatus::Completed, metadata).await
    }

    /// Mark a processing document failed, recording the reason
    pub async fn mark_failed(&self, id: &str, metadata: &DocumentMetadata) -> Result<()> {
        self.mark_terminal(id, DocumentStatus::Failed, metadata).await
    }

    async fn mark_terminal(
        &self,
        id: &str,
        status: DocumentStatus,
        metadata: &DocumentMetadata,
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(metadata)?;
        // only a claimed document may reach a terminal state
        let result = sqlx::query(
            "UPDATE documents SET status = ?, metadata_json = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(status.to_string())
        .bind(metadata_json)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(DocumentStatus::Processing.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::InvalidState(format!(
                "document {} is not processing",
                id
            )));
        }
        Ok(())
    }

    /// Reset a failed document so ingestion can be re-triggered.
    /// Returns false if the document is not in the failed state.
    pub async fn reset_for_retry(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(DocumentStatus::Uploading.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(DocumentStatus::Failed.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a document row. Chunks must already be gone.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Chunk Operations =====

    /// Replace the full chunk set for a document atomically
    pub async fn replace_chunks(&self, document_id: &str, chunks: &[DocumentChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO document_chunks (id, document_id, chunk_index, content, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(&chunk.embedding)
            .bind(&chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete all chunks of a document
    pub async fn delete_chunks(&self, document_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Get chunks for a document in index order
    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let chunks = sqlx::query_as::<_, DocumentChunk>(
            "SELECT * FROM document_chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Count chunks for a document
    pub async fn count_chunks(&self, document_id: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE document_id = ?")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Total chunk count across all documents
    pub async fn count_all_chunks(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Retrieval candidates: chunks of completed, active documents
    pub async fn chunk_candidates(&self) -> Result<Vec<ChunkCandidate>> {
        let candidates = sqlx::query_as::<_, ChunkCandidate>(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.content, c.embedding, c.created_at,
                   d.title AS document_title
            FROM document_chunks c
            JOIN documents d ON c.document_id = d.id
            WHERE d.status = 'completed' AND d.is_active = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(candidates)
    }

    // ===== FAQ Operations =====

    /// Insert a new FAQ
    pub async fn insert_faq(&self, faq: &Faq) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO faqs (id, question, answer, is_active, embedding, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&faq.id)
        .bind(&faq.question)
        .bind(&faq.answer)
        .bind(faq.is_active)
        .bind(&faq.embedding)
        .bind(&faq.created_at)
        .bind(&faq.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get FAQ by ID
    pub async fn get_faq(&self, id: &str) -> Result<Option<Faq>> {
        let faq = sqlx::query_as::<_, Faq>("SELECT * FROM faqs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(faq)
    }

    /// List all FAQs, newest first
    pub async fn list_faqs(&self) -> Result<Vec<Faq>> {
        let faqs = sqlx::query_as::<_, Faq>("SELECT * FROM faqs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(faqs)
    }

    /// FAQs whose embedding is missing
    pub async fn faqs_missing_embedding(&self) -> Result<Vec<Faq>> {
        let faqs = sqlx::query_as::<_, Faq>(
            "SELECT * FROM faqs WHERE embedding IS NULL ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(faqs)
    }

    /// Retrieval candidates: active FAQs with an embedding
    pub async fn faq_candidates(&self) -> Result<Vec<Faq>> {
        let faqs = sqlx::query_as::<_, Faq>(
            "SELECT * FROM faqs WHERE is_active = 1 AND embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(faqs)
    }

    /// Update a FAQ. A changed question or answer invalidates the
    /// stored embedding until it is regenerated.
    pub async fn update_faq(
        &self,
        id: &str,
        question: Option<String>,
        answer: Option<String>,
        is_active: Option<bool>,
    ) -> Result<Faq> {
        let existing = self
            .get_faq(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("FAQ {}", id)))?;

        let text_changed = question.as_ref().is_some_and(|q| *q != existing.question)
            || answer.as_ref().is_some_and(|a| *a != existing.answer);

        let question = question.unwrap_or(existing.question);
        let answer = answer.unwrap_or(existing.answer);
        let is_active = is_active.unwrap_or(existing.is_active);
        let embedding = if text_changed { None } else { existing.embedding };

        sqlx::query(
            r#"
            UPDATE faqs SET question = ?, answer = ?, is_active = ?, embedding = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&question)
        .bind(&answer)
        .bind(is_active)
        .bind(&embedding)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_faq(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("FAQ {}", id)))
    }

    /// Store a freshly computed FAQ embedding
    pub async fn set_faq_embedding(&self, id: &str, vector: &[f32]) -> Result<()> {
        let result = sqlx::query("UPDATE faqs SET embedding = ?, updated_at = ? WHERE id = ?")
            .bind(encode_embedding(vector))
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("FAQ {}", id)));
        }
        Ok(())
    }

    /// Delete a FAQ
    pub async fn delete_faq(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM faqs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("FAQ {}", id)));
        }
        Ok(())
    }

    /// Total FAQ count
    pub async fn count_faqs(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM faqs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ===== Statistics =====

    /// Document counts per status
    pub async fn status_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM documents GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Total size of all uploaded documents in bytes
    pub async fn total_document_size(&self) -> Result<i64> {
        let size = sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(size)
    }
}
