//! Storage abstraction for the knowledge core.
//!
//! The [`KnowledgeStore`] trait covers every persistence operation the
//! ingestion orchestrator and retrieval engine need, enabling pluggable
//! backends (SQLite in the service crate, in-memory here for tests).
//!
//! Tenant and document ids are the natural partition keys: concurrent
//! inserts/deletes scoped by document id must not disturb other documents'
//! chunks, and reads require no coordination beyond the backend's normal
//! consistency.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Chunk, CrawledPage, Document, DocumentStatus};

/// Per-tenant corpus counts for operator visibility.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TenantStats {
    pub documents: u64,
    pub chunks: u64,
    pub embedded_chunks: u64,
    pub pages: u64,
}

/// Abstract persistence backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_document`](KnowledgeStore::insert_document) | Register an uploaded document (`pending`) |
/// | [`get_document`](KnowledgeStore::get_document) | Fetch one tenant-scoped document |
/// | [`set_document_status`](KnowledgeStore::set_document_status) | Drive the processing state machine |
/// | [`delete_document`](KnowledgeStore::delete_document) | Remove a document and cascade its chunks |
/// | [`replace_chunks`](KnowledgeStore::replace_chunks) | Atomically swap a document's chunk set |
/// | [`attach_embedding`](KnowledgeStore::attach_embedding) | Add a vector to an existing chunk |
/// | [`similarity_search`](KnowledgeStore::similarity_search) | Cosine search over embedded chunks |
/// | [`scan_chunks`](KnowledgeStore::scan_chunks) | Bounded window for keyword scoring |
/// | [`upsert_page`](KnowledgeStore::upsert_page) | Crawler hand-off, keyed on `(tenant, url)` |
/// | [`scan_pages`](KnowledgeStore::scan_pages) | Bounded page window for keyword scoring |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    async fn get_document(&self, tenant_id: &str, id: &str) -> Result<Option<Document>>;

    /// Update the lifecycle status. `error` carries the operator-facing
    /// detail when the status is [`DocumentStatus::Error`] and clears it
    /// otherwise.
    async fn set_document_status(
        &self,
        tenant_id: &str,
        id: &str,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Delete a document; its chunks go with it.
    async fn delete_document(&self, tenant_id: &str, id: &str) -> Result<()>;

    /// Atomically replace every chunk belonging to `document_id`. A full
    /// replace, never a merge: reprocessing must not leave stale chunks.
    async fn replace_chunks(
        &self,
        tenant_id: &str,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<()>;

    /// Attach (or refresh) the embedding vector of one chunk.
    async fn attach_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<()>;

    /// Chunks of this tenant whose embedding cosine-similarity against
    /// `query_vec` meets `threshold`, best first, at most `limit`.
    /// Chunks without an embedding never match.
    async fn similarity_search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Chunk, f32)>>;

    /// A bounded window of the tenant's chunks in insertion order, for the
    /// keyword fallback stage.
    async fn scan_chunks(&self, tenant_id: &str, limit: usize) -> Result<Vec<Chunk>>;

    /// Chunks still waiting for a vector, in insertion order. Feeds the
    /// embedding backfill after failed batches.
    async fn unembedded_chunks(&self, tenant_id: &str, limit: usize) -> Result<Vec<Chunk>>;

    async fn upsert_page(&self, page: &CrawledPage) -> Result<()>;

    /// A bounded window of the tenant's crawled pages in insertion order.
    async fn scan_pages(&self, tenant_id: &str, limit: usize) -> Result<Vec<CrawledPage>>;

    async fn tenant_stats(&self, tenant_id: &str) -> Result<TenantStats>;
}
