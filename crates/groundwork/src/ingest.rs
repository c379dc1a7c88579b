//! Ingestion orchestration: drives one document through
//! `processing → completed | error`.
//!
//! The chunk swap is atomic (a full replace, never a merge), so neither a
//! failed run nor a reprocess superseding an in-flight attempt can leave a
//! partial chunk set behind. Embedding happens afterwards in bounded
//! batches; a failed batch is logged and skipped, the document still
//! completes, and its chunks remain keyword-searchable.

use serde::Deserialize;
use serde_json::json;

use groundwork_core::chunk::chunk_text;
use groundwork_core::error::IngestError;
use groundwork_core::models::{Chunk, Document, DocumentStatus, IngestReport, SourceType};
use groundwork_core::store::KnowledgeStore;

use crate::config::Config;
use crate::embedder::EmbeddingBackend;
use crate::extract::extract_text;

/// Ingestion trigger, as delivered by the upload/dashboard layer.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub tenant_id: String,
    pub document_id: String,
}

/// Process (or reprocess) one document end to end.
///
/// On any decode, parse, or persist failure the document moves to `error`
/// with the diagnostic recorded for operators, and the error is returned.
pub async fn process_document(
    store: &dyn KnowledgeStore,
    backend: &dyn EmbeddingBackend,
    config: &Config,
    request: &IngestRequest,
) -> Result<IngestReport, IngestError> {
    let document = store
        .get_document(&request.tenant_id, &request.document_id)
        .await?
        .ok_or_else(|| IngestError::DocumentNotFound(request.document_id.clone()))?;

    store
        .set_document_status(
            &request.tenant_id,
            &document.id,
            DocumentStatus::Processing,
            None,
        )
        .await?;
    tracing::info!(
        tenant_id = %request.tenant_id,
        document_id = %document.id,
        file_name = %document.file_name,
        "processing document"
    );

    match run_pipeline(store, backend, config, &document).await {
        Ok(report) => {
            store
                .set_document_status(
                    &request.tenant_id,
                    &document.id,
                    DocumentStatus::Completed,
                    None,
                )
                .await?;
            tracing::info!(
                document_id = %document.id,
                chunks = report.chunks_created,
                embeddings = report.embeddings_generated,
                "document completed"
            );
            Ok(report)
        }
        Err(e) => {
            let detail = e.to_string();
            tracing::error!(document_id = %document.id, error = %detail, "document failed");
            store
                .set_document_status(
                    &request.tenant_id,
                    &document.id,
                    DocumentStatus::Error,
                    Some(&detail),
                )
                .await?;
            Err(e)
        }
    }
}

async fn run_pipeline(
    store: &dyn KnowledgeStore,
    backend: &dyn EmbeddingBackend,
    config: &Config,
    document: &Document,
) -> Result<IngestReport, IngestError> {
    let path = config.storage.root.join(&document.storage_path);
    let bytes = tokio::fs::read(&path).await?;
    let text = extract_text(&bytes, &document.content_type)?;
    let total_characters = text.chars().count();

    let pieces = chunk_text(
        &text,
        config.chunking.target_chars,
        config.chunking.overlap_chars,
    );
    let chunk_count = pieces.len();
    let chunks: Vec<Chunk> = pieces
        .iter()
        .enumerate()
        .map(|(index, piece)| {
            Chunk::new(
                &document.tenant_id,
                Some(&document.id),
                SourceType::Document,
                index as i64,
                piece,
                json!({
                    "file_name": document.file_name,
                    "content_type": document.content_type,
                    "chunk_count": chunk_count,
                }),
            )
        })
        .collect();

    store
        .replace_chunks(&document.tenant_id, &document.id, &chunks)
        .await?;

    let embeddings_generated = embed_chunks(store, backend, config, &chunks).await;

    Ok(IngestReport {
        success: true,
        chunks_created: chunk_count,
        total_characters,
        embeddings_generated,
    })
}

/// Embed freshly inserted chunks in bounded batches. Batch failures are
/// independent: one failing neither blocks nor corrupts the others, and
/// nothing here rolls back the chunk insert.
async fn embed_chunks(
    store: &dyn KnowledgeStore,
    backend: &dyn EmbeddingBackend,
    config: &Config,
    chunks: &[Chunk],
) -> usize {
    if !config.embedding.is_enabled() || chunks.is_empty() {
        return 0;
    }

    let mut generated = 0usize;
    for batch in chunks.chunks(config.embedding.batch_size) {
        let ids: Vec<String> = batch.iter().map(|c| c.id.clone()).collect();
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        match backend.embed_batch(&ids, &texts).await {
            Ok(vectors) => {
                for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                    match store.attach_embedding(&chunk.id, vector).await {
                        Ok(()) => generated += 1,
                        Err(e) => {
                            tracing::warn!(chunk_id = %chunk.id, error = %e, "failed to store embedding");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    backend = backend.name(),
                    batch_len = batch.len(),
                    error = %e,
                    "embedding batch failed; chunks remain keyword-searchable"
                );
            }
        }
    }
    generated
}

/// Backfill vectors for chunks whose embedding batches failed earlier,
/// without reprocessing their documents. Returns the number of embeddings
/// attached; stops at the first batch that makes no progress so a dead
/// backend cannot spin the loop.
pub async fn embed_missing(
    store: &dyn KnowledgeStore,
    backend: &dyn EmbeddingBackend,
    config: &Config,
    tenant_id: &str,
) -> usize {
    if !config.embedding.is_enabled() {
        return 0;
    }

    let mut generated = 0usize;
    loop {
        let batch = match store
            .unembedded_chunks(tenant_id, config.embedding.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "could not list unembedded chunks");
                break;
            }
        };
        if batch.is_empty() {
            break;
        }

        let ids: Vec<String> = batch.iter().map(|c| c.id.clone()).collect();
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let mut attached = 0usize;
        match backend.embed_batch(&ids, &texts).await {
            Ok(vectors) => {
                for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                    match store.attach_embedding(&chunk.id, vector).await {
                        Ok(()) => attached += 1,
                        Err(e) => {
                            tracing::warn!(chunk_id = %chunk.id, error = %e, "failed to store embedding");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "embedding backfill batch failed");
            }
        }

        generated += attached;
        if attached == 0 {
            break;
        }
    }
    generated
}
