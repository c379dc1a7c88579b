//! Data models flowing through the ingestion and retrieval pipeline.
//!
//! Persistent records ([`Document`], [`Chunk`], [`CrawledPage`]) are scoped
//! by tenant; [`RetrievalResult`] and [`QueryFeatures`] are per-query
//! ephemera and never stored.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Processing lifecycle of an uploaded document.
///
/// `pending → processing → completed`, or `processing → error`. A manual
/// reprocess re-enters at `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DocumentStatus::Pending),
            "processing" => Some(DocumentStatus::Processing),
            "completed" => Some(DocumentStatus::Completed),
            "error" => Some(DocumentStatus::Error),
            _ => None,
        }
    }
}

/// Where a chunk's text originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Document,
    Website,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Document => "document",
            SourceType::Website => "website",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(SourceType::Document),
            "website" => Some(SourceType::Website),
            _ => None,
        }
    }
}

/// A tenant-scoped uploaded file awaiting or finished with processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    pub file_name: String,
    pub content_type: String,
    pub byte_size: i64,
    /// Location of the raw bytes, relative to the configured storage root.
    pub storage_path: String,
    pub status: DocumentStatus,
    /// Diagnostic detail for operators when `status == Error`. Never
    /// surfaced to end users.
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    pub fn new(
        tenant_id: &str,
        file_name: &str,
        content_type: &str,
        byte_size: i64,
        storage_path: &str,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            byte_size,
            storage_path: storage_path.to_string(),
            status: DocumentStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A bounded segment of normalized text stored for retrieval.
///
/// The embedding is attached asynchronously and may be absent; the chunk
/// stays keyword-searchable in the interim. Chunk ids are derived from
/// provenance and content, so reprocessing unchanged input recreates the
/// same ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub tenant_id: String,
    pub document_id: Option<String>,
    pub source_type: SourceType,
    pub chunk_index: i64,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    /// Free-form provenance: file name, content type, and total chunk count
    /// for documents; url and title for website chunks.
    pub metadata: serde_json::Value,
}

impl Chunk {
    pub fn new(
        tenant_id: &str,
        document_id: Option<&str>,
        source_type: SourceType,
        chunk_index: i64,
        text: &str,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: chunk_id(tenant_id, document_id, chunk_index, text),
            tenant_id: tenant_id.to_string(),
            document_id: document_id.map(|s| s.to_string()),
            source_type,
            chunk_index,
            text: text.to_string(),
            embedding: None,
            metadata,
        }
    }
}

/// Deterministic chunk id: SHA-256 over tenant, parent, ordinal, and text.
fn chunk_id(tenant_id: &str, document_id: Option<&str>, index: i64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update(document_id.unwrap_or_default().as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A page delivered by the external crawler. The retrieval engine only
/// reads these; creation and refresh belong to the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledPage {
    pub tenant_id: String,
    pub url: String,
    pub title: String,
    pub text: String,
    pub fetched_at: i64,
}

impl CrawledPage {
    pub fn new(tenant_id: &str, url: &str, title: &str, text: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            fetched_at: Utc::now().timestamp(),
        }
    }
}

/// One ranked hit handed to the context assembler. Built per query,
/// discarded after the response is assembled.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub text: String,
    /// Human-readable provenance label (file name, or page title/url).
    pub source: String,
    pub source_type: SourceType,
    /// Normalized relevance, roughly in `[0, 1]`.
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// Query-side features computed once and reused by every retrieval stage.
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    pub embedding: Vec<f32>,
    pub keywords: Vec<String>,
    pub phrases: Vec<String>,
}

/// Outcome of one document-processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub success: bool,
    pub chunks_created: usize,
    pub total_characters: usize,
    pub embeddings_generated: usize,
}

/// Assembled grounding hand-off for the generative layer.
#[derive(Debug, Clone, Serialize)]
pub struct GroundedContext {
    pub grounding_block: String,
    pub sources: Vec<String>,
    pub has_context: bool,
    pub intent: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Processing,
            DocumentStatus::Completed,
            DocumentStatus::Error,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("archived"), None);
    }

    #[test]
    fn chunk_ids_are_deterministic_over_content() {
        let a = Chunk::new("t1", None, SourceType::Website, 0, "hello world", serde_json::json!({}));
        let b = Chunk::new("t1", None, SourceType::Website, 0, "hello world", serde_json::json!({}));
        let c = Chunk::new("t1", None, SourceType::Website, 0, "other text", serde_json::json!({}));
        let d = Chunk::new("t2", None, SourceType::Website, 0, "hello world", serde_json::json!({}));
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_ne!(a.id, d.id);
        assert!(a.embedding.is_none());
    }
}
