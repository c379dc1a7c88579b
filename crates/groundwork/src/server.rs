//! HTTP surface for the ingestion and chat-serving layers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Process a document: `{tenant_id, document_id}` → ingest report |
//! | `POST` | `/query` | Retrieve grounding context: `{tenant_id, query}` → grounded context |
//! | `POST` | `/embed/backfill` | Attach vectors to chunks left bare by failed batches |
//! | `GET`  | `/stats?tenant_id=` | Per-tenant corpus counts |
//! | `GET`  | `/health` | Liveness check (returns version) |
//!
//! Errors use the envelope `{"error": {"code": "...", "message": "..."}}`.
//! Ingestion failures also leave the document in the `error` status; the
//! HTTP message is operator-facing, never shown to end users.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use groundwork_core::error::IngestError;
use groundwork_core::store::KnowledgeStore;

use crate::config::Config;
use crate::db;
use crate::embedder::{self, EmbeddingBackend};
use crate::ingest::{embed_missing, process_document, IngestRequest};
use crate::migrate::run_migrations;
use crate::query::{answer_context, QueryRequest};
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<SqliteStore>,
    backend: Arc<dyn EmbeddingBackend>,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(ErrorEnvelope {
            error: ErrorBody { code, message },
        }),
    )
        .into_response()
}

fn ingest_error_response(err: &IngestError) -> Response {
    match err {
        IngestError::UnsupportedFormat(_) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unsupported_format",
            err.to_string(),
        ),
        IngestError::Malformed { .. } => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "malformed_file",
            err.to_string(),
        ),
        IngestError::DocumentNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        IngestError::Io(_) | IngestError::Storage(_) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
        }
    }
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Response {
    match process_document(
        state.store.as_ref(),
        state.backend.as_ref(),
        &state.config,
        &request,
    )
    .await
    {
        Ok(report) => Json(report).into_response(),
        Err(e) => ingest_error_response(&e),
    }
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Response {
    if request.query.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "query must not be empty".to_string(),
        );
    }
    let context = answer_context(state.store.as_ref(), &state.config, &request).await;
    Json(context).into_response()
}

#[derive(Deserialize)]
struct BackfillRequest {
    tenant_id: String,
}

async fn handle_backfill(
    State(state): State<AppState>,
    Json(request): Json<BackfillRequest>,
) -> Response {
    let generated = embed_missing(
        state.store.as_ref(),
        state.backend.as_ref(),
        &state.config,
        &request.tenant_id,
    )
    .await;
    Json(serde_json::json!({ "embeddings_generated": generated })).into_response()
}

#[derive(Deserialize)]
struct StatsParams {
    tenant_id: String,
}

async fn handle_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Response {
    match state.store.tenant_stats(&params.tenant_id).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
    }
}

async fn handle_health() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/query", post(handle_query))
        .route("/embed/backfill", post(handle_backfill))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Open the database, run migrations, and serve until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db.path).await?;
    run_migrations(&pool).await?;

    let state = AppState {
        backend: Arc::from(embedder::create_backend(&config.embedding)?),
        store: Arc::new(SqliteStore::new(pool)),
        config: Arc::new(config.clone()),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "groundwork listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
