//! Hybrid retrieval engine: vector similarity, keyword scoring over chunks,
//! and keyword scoring over crawled pages, merged into one ranked,
//! deduplicated result list.
//!
//! Every stage tolerates the failure of the others: a store error in one
//! stage is logged and that stage contributes nothing. Even with all three
//! stages down the caller sees an empty result set rather than an error,
//! so an ungrounded answer can still be produced.
//!
//! Ties are broken by insertion order (the sort is stable): vector hits
//! precede keyword hits precede page hits at equal scores.

use crate::models::{Chunk, CrawledPage, QueryFeatures, RetrievalResult, SourceType};
use crate::score::{keyword_score, SCORE_FLOOR, SCORE_SCALE};
use crate::store::KnowledgeStore;

/// Prefix length used for cross-stage deduplication.
const DEDUP_PREFIX_CHARS: usize = 100;

/// Tuning knobs for one retrieval run. The scan caps bound the cost of the
/// keyword fallback until a real inverted index replaces it; keep them
/// configurable.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Minimum cosine similarity for a vector hit.
    pub similarity_threshold: f32,
    /// Vector-stage result cap.
    pub vector_limit: usize,
    /// How many of the tenant's chunks the keyword stage scans.
    pub chunk_scan_limit: usize,
    /// Keyword-stage result cap.
    pub keyword_limit: usize,
    /// Raw keyword scores at or below this are dropped.
    pub keyword_score_floor: f32,
    /// How many of the tenant's crawled pages the page stage scans.
    pub page_scan_limit: usize,
    /// Page-stage result cap.
    pub page_limit: usize,
    /// Page text is truncated to this many chars before being returned.
    pub page_text_limit: usize,
    /// Overall cap after the merge.
    pub final_limit: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.25,
            vector_limit: 8,
            chunk_scan_limit: 150,
            keyword_limit: 5,
            keyword_score_floor: SCORE_FLOOR,
            page_scan_limit: 50,
            page_limit: 3,
            page_text_limit: 2000,
            final_limit: 8,
        }
    }
}

/// Run all three retrieval stages for one tenant and merge the results.
pub async fn retrieve<S: KnowledgeStore + ?Sized>(
    store: &S,
    tenant_id: &str,
    features: &QueryFeatures,
    params: &RetrievalParams,
) -> Vec<RetrievalResult> {
    let mut results: Vec<RetrievalResult> = Vec::new();

    match store
        .similarity_search(
            tenant_id,
            &features.embedding,
            params.similarity_threshold,
            params.vector_limit,
        )
        .await
    {
        Ok(hits) => {
            for (chunk, similarity) in hits {
                results.push(result_from_chunk(&chunk, similarity));
            }
        }
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "vector stage failed, continuing without it");
        }
    }

    let seen: Vec<String> = results.iter().map(|r| dedup_key(&r.text)).collect();

    match store.scan_chunks(tenant_id, params.chunk_scan_limit).await {
        Ok(chunks) => {
            let mut scored: Vec<(f32, &Chunk)> = chunks
                .iter()
                .map(|c| (keyword_score(&c.text, features), c))
                .filter(|(score, _)| *score > params.keyword_score_floor)
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut added = 0usize;
            for (score, chunk) in scored {
                if added >= params.keyword_limit {
                    break;
                }
                if seen.contains(&dedup_key(&chunk.text)) {
                    continue;
                }
                results.push(result_from_chunk(chunk, score / SCORE_SCALE));
                added += 1;
            }
        }
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "keyword stage failed, continuing without it");
        }
    }

    match store.scan_pages(tenant_id, params.page_scan_limit).await {
        Ok(pages) => {
            let mut scored: Vec<(f32, &CrawledPage)> = pages
                .iter()
                .map(|p| (keyword_score(&p.text, features), p))
                .filter(|(score, _)| *score > params.keyword_score_floor)
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(params.page_limit);

            for (score, page) in scored {
                results.push(result_from_page(page, score / SCORE_SCALE, params.page_text_limit));
            }
        }
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "page stage failed, continuing without it");
        }
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(params.final_limit);
    results
}

fn dedup_key(text: &str) -> String {
    text.chars().take(DEDUP_PREFIX_CHARS).collect()
}

fn result_from_chunk(chunk: &Chunk, score: f32) -> RetrievalResult {
    let source = chunk
        .metadata
        .get("file_name")
        .and_then(|v| v.as_str())
        .or_else(|| chunk.metadata.get("url").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            chunk
                .document_id
                .clone()
                .unwrap_or_else(|| chunk.source_type.as_str().to_string())
        });
    RetrievalResult {
        text: chunk.text.clone(),
        source,
        source_type: chunk.source_type,
        score,
        metadata: chunk.metadata.clone(),
    }
}

fn result_from_page(page: &CrawledPage, score: f32, text_limit: usize) -> RetrievalResult {
    let text = if page.text.chars().count() > text_limit {
        page.text.chars().take(text_limit).collect()
    } else {
        page.text.clone()
    };
    let source = if page.title.is_empty() {
        page.url.clone()
    } else {
        page.title.clone()
    };
    RetrievalResult {
        text,
        source,
        source_type: SourceType::Website,
        score,
        metadata: serde_json::json!({ "url": page.url, "title": page.title }),
    }
}
