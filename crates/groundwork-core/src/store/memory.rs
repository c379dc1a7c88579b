//! In-memory [`KnowledgeStore`] for tests and embedded use.
//!
//! `HashMap`/`Vec` behind `std::sync::RwLock`. Similarity search is
//! brute-force cosine over every stored vector, which mirrors what the
//! SQLite backend does and keeps the two implementations interchangeable
//! in tests.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::features::cosine_similarity;
use crate::models::{Chunk, CrawledPage, Document, DocumentStatus};

use super::{KnowledgeStore, TenantStats};

/// In-memory store. Cheap to construct per test.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<Chunk>>,
    pages: RwLock<Vec<CrawledPage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        self.docs
            .write()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get_document(&self, tenant_id: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .docs
            .read()
            .unwrap()
            .get(id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn set_document_status(
        &self,
        tenant_id: &str,
        id: &str,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        let doc = docs
            .get_mut(id)
            .filter(|d| d.tenant_id == tenant_id)
            .ok_or_else(|| anyhow!("no such document: {id}"))?;
        doc.status = status;
        doc.error = if status == DocumentStatus::Error {
            error.map(|e| e.to_string())
        } else {
            None
        };
        doc.updated_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    async fn delete_document(&self, tenant_id: &str, id: &str) -> Result<()> {
        let removed = {
            let mut docs = self.docs.write().unwrap();
            let matches = docs.get(id).is_some_and(|d| d.tenant_id == tenant_id);
            if matches {
                docs.remove(id);
            }
            matches
        };
        if removed {
            self.chunks
                .write()
                .unwrap()
                .retain(|c| c.document_id.as_deref() != Some(id));
        }
        Ok(())
    }

    async fn replace_chunks(
        &self,
        _tenant_id: &str,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|c| c.document_id.as_deref() != Some(document_id));
        stored.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn attach_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        let chunk = stored
            .iter_mut()
            .find(|c| c.id == chunk_id)
            .ok_or_else(|| anyhow!("no such chunk: {chunk_id}"))?;
        chunk.embedding = Some(vector.to_vec());
        Ok(())
    }

    async fn similarity_search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Chunk, f32)>> {
        let stored = self.chunks.read().unwrap();
        let mut hits: Vec<(Chunk, f32)> = stored
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .filter_map(|c| {
                let vec = c.embedding.as_ref()?;
                let sim = cosine_similarity(query_vec, vec);
                (sim >= threshold).then(|| (c.clone(), sim))
            })
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scan_chunks(&self, tenant_id: &str, limit: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .chunks
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn unembedded_chunks(&self, tenant_id: &str, limit: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .chunks
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.embedding.is_none())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn upsert_page(&self, page: &CrawledPage) -> Result<()> {
        let mut pages = self.pages.write().unwrap();
        if let Some(existing) = pages
            .iter_mut()
            .find(|p| p.tenant_id == page.tenant_id && p.url == page.url)
        {
            *existing = page.clone();
        } else {
            pages.push(page.clone());
        }
        Ok(())
    }

    async fn scan_pages(&self, tenant_id: &str, limit: usize) -> Result<Vec<CrawledPage>> {
        Ok(self
            .pages
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn tenant_stats(&self, tenant_id: &str) -> Result<TenantStats> {
        let docs = self.docs.read().unwrap();
        let chunks = self.chunks.read().unwrap();
        let pages = self.pages.read().unwrap();
        let tenant_chunks: Vec<&Chunk> =
            chunks.iter().filter(|c| c.tenant_id == tenant_id).collect();
        Ok(TenantStats {
            documents: docs.values().filter(|d| d.tenant_id == tenant_id).count() as u64,
            chunks: tenant_chunks.len() as u64,
            embedded_chunks: tenant_chunks
                .iter()
                .filter(|c| c.embedding.is_some())
                .count() as u64,
            pages: pages.iter().filter(|p| p.tenant_id == tenant_id).count() as u64,
        })
    }
}
