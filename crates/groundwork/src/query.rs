//! Query entry point: one incoming question in, one grounded context out.
//!
//! Query features are computed once and shared by every retrieval stage.
//! This function never fails: stage errors degrade to fewer results, and
//! an empty result set surfaces as `has_context = false` so the chat layer
//! can still answer ungrounded.

use serde::Deserialize;

use groundwork_core::assemble::grounded_context;
use groundwork_core::features::query_features;
use groundwork_core::models::GroundedContext;
use groundwork_core::retrieve::retrieve;
use groundwork_core::store::KnowledgeStore;

use crate::config::Config;

/// Query trigger, as delivered by the chat orchestration layer.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub tenant_id: String,
    pub query: String,
}

/// Retrieve and assemble grounding context for one question.
pub async fn answer_context(
    store: &dyn KnowledgeStore,
    config: &Config,
    request: &QueryRequest,
) -> GroundedContext {
    let features = query_features(&request.query);
    let params = config.retrieval.params();
    let results = retrieve(store, &request.tenant_id, &features, &params).await;
    tracing::debug!(
        tenant_id = %request.tenant_id,
        results = results.len(),
        "retrieval finished"
    );
    grounded_context(&request.query, &results)
}
