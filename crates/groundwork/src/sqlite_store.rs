//! SQLite-backed [`KnowledgeStore`] implementation.
//!
//! Embeddings live in a BLOB column beside the chunk row (little-endian
//! f32); similarity search loads the tenant's embedded chunks and ranks by
//! cosine in process, matching the in-memory store's behavior. The chunk
//! swap runs in one transaction so reprocessing can never expose a partial
//! chunk set.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use groundwork_core::features::{blob_to_vec, cosine_similarity, vec_to_blob};
use groundwork_core::models::{Chunk, CrawledPage, Document, DocumentStatus, SourceType};
use groundwork_core::store::{KnowledgeStore, TenantStats};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn chunk_from_row(row: &sqlx::sqlite::SqliteRow) -> Chunk {
    let source_type: String = row.get("source_type");
    let metadata_json: String = row.get("metadata_json");
    let embedding: Option<Vec<u8>> = row.get("embedding");
    Chunk {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        document_id: row.get("document_id"),
        source_type: SourceType::parse(&source_type).unwrap_or(SourceType::Document),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Document {
    let status: String = row.get("status");
    Document {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        byte_size: row.get("byte_size"),
        storage_path: row.get("storage_path"),
        status: DocumentStatus::parse(&status).unwrap_or(DocumentStatus::Pending),
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, tenant_id, file_name, content_type, byte_size,
                                   storage_path, status, error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                file_name = excluded.file_name,
                content_type = excluded.content_type,
                byte_size = excluded.byte_size,
                storage_path = excluded.storage_path,
                status = excluded.status,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.tenant_id)
        .bind(&doc.file_name)
        .bind(&doc.content_type)
        .bind(doc.byte_size)
        .bind(&doc.storage_path)
        .bind(doc.status.as_str())
        .bind(&doc.error)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, tenant_id: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ? AND tenant_id = ?")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(document_from_row))
    }

    async fn set_document_status(
        &self,
        tenant_id: &str,
        id: &str,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let error = if status == DocumentStatus::Error {
            error
        } else {
            None
        };
        let updated = sqlx::query(
            "UPDATE documents SET status = ?, error = ?, updated_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            anyhow::bail!("no such document: {id}");
        }
        Ok(())
    }

    async fn delete_document(&self, tenant_id: &str, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ? AND tenant_id = ?")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ? AND tenant_id = ?")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_chunks(
        &self,
        tenant_id: &str,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ? AND tenant_id = ?")
            .bind(document_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, tenant_id, document_id, source_type, chunk_index,
                                    text, embedding, metadata_json)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.tenant_id)
            .bind(&chunk.document_id)
            .bind(chunk.source_type.as_str())
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.embedding.as_ref().map(|v| vec_to_blob(v)))
            .bind(chunk.metadata.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn attach_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<()> {
        let updated = sqlx::query("UPDATE chunks SET embedding = ? WHERE id = ?")
            .bind(vec_to_blob(vector))
            .bind(chunk_id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            anyhow::bail!("no such chunk: {chunk_id}");
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Chunk, f32)>> {
        let rows =
            sqlx::query("SELECT * FROM chunks WHERE tenant_id = ? AND embedding IS NOT NULL")
                .bind(tenant_id)
                .fetch_all(&self.pool)
                .await?;

        let mut hits: Vec<(Chunk, f32)> = rows
            .iter()
            .filter_map(|row| {
                let chunk = chunk_from_row(row);
                let sim = cosine_similarity(query_vec, chunk.embedding.as_deref()?);
                (sim >= threshold).then_some((chunk, sim))
            })
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scan_chunks(&self, tenant_id: &str, limit: usize) -> Result<Vec<Chunk>> {
        let rows = sqlx::query("SELECT * FROM chunks WHERE tenant_id = ? ORDER BY rowid LIMIT ?")
            .bind(tenant_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(chunk_from_row).collect())
    }

    async fn unembedded_chunks(&self, tenant_id: &str, limit: usize) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT * FROM chunks WHERE tenant_id = ? AND embedding IS NULL ORDER BY rowid LIMIT ?",
        )
        .bind(tenant_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(chunk_from_row).collect())
    }

    async fn upsert_page(&self, page: &CrawledPage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawled_pages (tenant_id, url, title, text, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(tenant_id, url) DO UPDATE SET
                title = excluded.title,
                text = excluded.text,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&page.tenant_id)
        .bind(&page.url)
        .bind(&page.title)
        .bind(&page.text)
        .bind(page.fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn scan_pages(&self, tenant_id: &str, limit: usize) -> Result<Vec<CrawledPage>> {
        let rows = sqlx::query(
            "SELECT * FROM crawled_pages WHERE tenant_id = ? ORDER BY rowid LIMIT ?",
        )
        .bind(tenant_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| CrawledPage {
                tenant_id: row.get("tenant_id"),
                url: row.get("url"),
                title: row.get("title"),
                text: row.get("text"),
                fetched_at: row.get("fetched_at"),
            })
            .collect())
    }

    async fn tenant_stats(&self, tenant_id: &str) -> Result<TenantStats> {
        let documents: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE tenant_id = ?")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;
        let embedded_chunks: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks WHERE tenant_id = ? AND embedding IS NOT NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        let pages: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM crawled_pages WHERE tenant_id = ?")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(TenantStats {
            documents: documents as u64,
            chunks: chunks as u64,
            embedded_chunks: embedded_chunks as u64,
            pages: pages as u64,
        })
    }
}
