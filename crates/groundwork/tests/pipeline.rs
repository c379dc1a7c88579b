//! End-to-end ingestion and retrieval over the SQLite backend.

use std::io::Write;
use std::path::Path;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use groundwork::config::{
    ChunkingConfig, Config, DbConfig, EmbeddingConfig, RetrievalConfig, ServerConfig,
    StorageConfig,
};
use groundwork::db;
use groundwork::embedder::create_backend;
use groundwork::extract::MIME_DOCX;
use groundwork::ingest::{process_document, IngestRequest};
use groundwork::migrate::run_migrations;
use groundwork::query::{answer_context, QueryRequest};
use groundwork::sqlite_store::SqliteStore;
use groundwork_core::models::{CrawledPage, Document, DocumentStatus, SourceType};
use groundwork_core::store::KnowledgeStore;

fn test_config(root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("data/groundwork.sqlite"),
        },
        storage: StorageConfig {
            root: root.to_path_buf(),
        },
        chunking: ChunkingConfig::default(),
        retrieval: RetrievalConfig::default(),
        embedding: EmbeddingConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}

async fn setup() -> (TempDir, Config, SqliteStore) {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let pool = db::connect(&config.db.path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (tmp, config, SqliteStore::new(pool))
}

async fn upload(
    store: &SqliteStore,
    root: &Path,
    tenant: &str,
    file_name: &str,
    content_type: &str,
    body: &[u8],
) -> Document {
    std::fs::write(root.join(file_name), body).unwrap();
    let doc = Document::new(tenant, file_name, content_type, body.len() as i64, file_name);
    store.insert_document(&doc).await.unwrap();
    doc
}

fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

#[tokio::test]
async fn docx_upload_is_searchable_end_to_end() {
    let (tmp, config, store) = setup().await;
    let backend = create_backend(&config.embedding).unwrap();

    let bytes = docx_fixture(&[
        "Refunds are available within thirty days of purchase.",
        "Contact support for anything else.",
    ]);
    let doc = upload(&store, tmp.path(), "t1", "policy.docx", MIME_DOCX, &bytes).await;

    let report = process_document(
        &store,
        backend.as_ref(),
        &config,
        &IngestRequest {
            tenant_id: "t1".to_string(),
            document_id: doc.id.clone(),
        },
    )
    .await
    .unwrap();
    assert!(report.success);
    assert!(report.chunks_created >= 1);
    assert_eq!(report.embeddings_generated, report.chunks_created);

    let stored = store.get_document("t1", &doc.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Completed);

    let ctx = answer_context(
        &store,
        &config,
        &QueryRequest {
            tenant_id: "t1".to_string(),
            query: "Can I get a refund within thirty days?".to_string(),
        },
    )
    .await;
    assert!(ctx.has_context);
    assert!(ctx.grounding_block.contains("[Document: policy.docx]"));
    assert!(ctx.sources.contains(&"policy.docx".to_string()));
    assert_eq!(ctx.intent, "pricing");
}

#[tokio::test]
async fn unsupported_media_type_errors_the_document() {
    let (tmp, config, store) = setup().await;
    let backend = create_backend(&config.embedding).unwrap();

    let doc = upload(
        &store,
        tmp.path(),
        "t1",
        "movie.mp4",
        "video/mp4",
        b"not text",
    )
    .await;

    let result = process_document(
        &store,
        backend.as_ref(),
        &config,
        &IngestRequest {
            tenant_id: "t1".to_string(),
            document_id: doc.id.clone(),
        },
    )
    .await;
    assert!(result.is_err());

    let stored = store.get_document("t1", &doc.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Error);
    assert!(stored.error.is_some());
    assert!(store.scan_chunks("t1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn exact_phrase_ranks_its_chunk_first() {
    let (tmp, mut config, store) = setup().await;
    // keyword ranking only: the phrase must win on score, not on vectors
    config.embedding.backend = "disabled".to_string();
    let backend = create_backend(&config.embedding).unwrap();

    let filler = format!(
        "General product overview. {}",
        "More assorted paragraphs about many topics follow. ".repeat(30)
    );
    let doc = upload(
        &store,
        tmp.path(),
        "t1",
        "kb.txt",
        "text/plain",
        format!("{filler}\n\nEnterprise volume discounts apply to annual contracts.").as_bytes(),
    )
    .await;
    process_document(
        &store,
        backend.as_ref(),
        &config,
        &IngestRequest {
            tenant_id: "t1".to_string(),
            document_id: doc.id,
        },
    )
    .await
    .unwrap();

    let ctx = answer_context(
        &store,
        &config,
        &QueryRequest {
            tenant_id: "t1".to_string(),
            query: "enterprise volume discounts".to_string(),
        },
    )
    .await;
    assert!(ctx.has_context);
    let first_block = ctx.grounding_block.split("\n\n").next().unwrap();
    assert!(
        first_block.contains("Enterprise volume discounts"),
        "phrase chunk should rank first:\n{}",
        ctx.grounding_block
    );
}

#[tokio::test]
async fn reprocessing_replaces_chunks_not_merges() {
    let (tmp, config, store) = setup().await;
    let backend = create_backend(&config.embedding).unwrap();

    let doc = upload(
        &store,
        tmp.path(),
        "t1",
        "faq.txt",
        "text/plain",
        b"Original answer about delivery times.",
    )
    .await;
    let request = IngestRequest {
        tenant_id: "t1".to_string(),
        document_id: doc.id.clone(),
    };
    process_document(&store, backend.as_ref(), &config, &request)
        .await
        .unwrap();

    std::fs::write(
        tmp.path().join("faq.txt"),
        b"Updated answer about delivery times and customs.",
    )
    .unwrap();
    process_document(&store, backend.as_ref(), &config, &request)
        .await
        .unwrap();

    let chunks = store.scan_chunks("t1", 10).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.contains("Updated answer"));
    assert!(chunks[0].embedding.is_some());
}

#[tokio::test]
async fn crawled_pages_reach_the_grounding_block() {
    let (_tmp, config, store) = setup().await;

    store
        .upsert_page(&CrawledPage::new(
            "t1",
            "https://acme.test/shipping",
            "Shipping",
            "We ship worldwide within five business days.",
        ))
        .await
        .unwrap();

    let ctx = answer_context(
        &store,
        &config,
        &QueryRequest {
            tenant_id: "t1".to_string(),
            query: "do you ship worldwide".to_string(),
        },
    )
    .await;
    assert!(ctx.has_context);
    assert!(ctx.grounding_block.contains("[Website: Shipping]"));
}

#[tokio::test]
async fn document_delete_cascades_and_stats_track() {
    let (tmp, config, store) = setup().await;
    let backend = create_backend(&config.embedding).unwrap();

    let doc = upload(
        &store,
        tmp.path(),
        "t1",
        "notes.txt",
        "text/plain",
        b"Some knowledge base notes worth keeping around.",
    )
    .await;
    process_document(
        &store,
        backend.as_ref(),
        &config,
        &IngestRequest {
            tenant_id: "t1".to_string(),
            document_id: doc.id.clone(),
        },
    )
    .await
    .unwrap();
    store
        .upsert_page(&CrawledPage::new("t1", "https://acme.test", "Home", "hi"))
        .await
        .unwrap();

    let stats = store.tenant_stats("t1").await.unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.embedded_chunks, 1);
    assert_eq!(stats.pages, 1);

    store.delete_document("t1", &doc.id).await.unwrap();
    let stats = store.tenant_stats("t1").await.unwrap();
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.chunks, 0);
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let (tmp, config, store) = setup().await;
    let backend = create_backend(&config.embedding).unwrap();

    let doc = upload(
        &store,
        tmp.path(),
        "tenant-a",
        "secret.txt",
        "text/plain",
        b"The launch date is March and the codename is Falcon.",
    )
    .await;
    process_document(
        &store,
        backend.as_ref(),
        &config,
        &IngestRequest {
            tenant_id: "tenant-a".to_string(),
            document_id: doc.id,
        },
    )
    .await
    .unwrap();

    let ctx = answer_context(
        &store,
        &config,
        &QueryRequest {
            tenant_id: "tenant-b".to_string(),
            query: "when is the launch date codename Falcon".to_string(),
        },
    )
    .await;
    assert!(!ctx.has_context);
}

#[tokio::test]
async fn similarity_search_respects_the_threshold() {
    let (tmp, config, store) = setup().await;
    let backend = create_backend(&config.embedding).unwrap();

    let doc = upload(
        &store,
        tmp.path(),
        "t1",
        "topics.txt",
        "text/plain",
        b"Kubernetes cluster autoscaling configuration guide.",
    )
    .await;
    process_document(
        &store,
        backend.as_ref(),
        &config,
        &IngestRequest {
            tenant_id: "t1".to_string(),
            document_id: doc.id,
        },
    )
    .await
    .unwrap();

    let close = groundwork_core::features::embed("kubernetes cluster autoscaling");
    let hits = store.similarity_search("t1", &close, 0.25, 8).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].1 >= 0.25);

    // an impossible threshold filters everything
    let none = store.similarity_search("t1", &close, 0.999, 8).await.unwrap();
    assert!(none.len() <= hits.len());

    let chunks = store.scan_chunks("t1", 10).await.unwrap();
    assert_eq!(chunks[0].source_type, SourceType::Document);
}
