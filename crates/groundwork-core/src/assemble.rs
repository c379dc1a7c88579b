//! Context assembly and intent classification.
//!
//! Formats ranked retrieval results into the labeled grounding block handed
//! to the generative layer, and assigns a coarse intent category to the raw
//! query via ordered keyword patterns. Both are deterministic heuristics,
//! not models.

use crate::models::{GroundedContext, RetrievalResult, SourceType};

/// Coarse query category used to steer prompt framing downstream. Never
/// gates retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Pricing,
    Features,
    HowTo,
    Contact,
    About,
    Troubleshooting,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Pricing => "pricing",
            Intent::Features => "features",
            Intent::HowTo => "how_to",
            Intent::Contact => "contact",
            Intent::About => "about",
            Intent::Troubleshooting => "troubleshooting",
            Intent::General => "general",
        }
    }
}

/// Ordered category patterns; the first category with a matching pattern
/// wins. Order matters: "how much" must hit pricing before the how-to
/// patterns see the query.
const INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::Pricing,
        &[
            "price", "pricing", "cost", "how much", "subscription", "plan",
            "tier", "fee", "discount", "refund",
        ],
    ),
    (
        Intent::Features,
        &[
            "feature", "can it", "does it", "can you", "capabilit", "integrat",
            "what can",
        ],
    ),
    (
        Intent::HowTo,
        &[
            "how do", "how to", "how can", "set up", "setup", "install",
            "configure", "connect", "enable", "start",
        ],
    ),
    (
        Intent::Contact,
        &[
            "contact", "email", "phone", "reach", "talk to", "speak to",
            "human", "agent", "support team",
        ],
    ),
    (
        Intent::About,
        &[
            "who are", "about you", "about the company", "what is this",
            "who made", "company",
        ],
    ),
    (
        Intent::Troubleshooting,
        &[
            "error", "issue", "problem", "not working", "doesn't work",
            "does not work", "broken", "failed", "fails", "bug", "crash",
            "stuck",
        ],
    ),
];

/// Classify a raw query by substring matching against the ordered patterns.
pub fn classify_intent(query: &str) -> Intent {
    let lowered = query.to_lowercase();
    for (intent, patterns) in INTENT_PATTERNS {
        if patterns.iter().any(|p| lowered.contains(p)) {
            return *intent;
        }
    }
    Intent::General
}

fn confidence_label(score: f32) -> &'static str {
    if score > 0.5 {
        "high"
    } else if score > 0.3 {
        "medium"
    } else {
        "low"
    }
}

fn source_type_label(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Document => "Document",
        SourceType::Website => "Website",
    }
}

/// Format ranked results into one grounding block plus a deduplicated,
/// ordered source list.
pub fn assemble_context(results: &[RetrievalResult]) -> (String, Vec<String>) {
    let mut blocks = Vec::with_capacity(results.len());
    let mut sources: Vec<String> = Vec::new();

    for result in results {
        blocks.push(format!(
            "[{}: {}] (confidence: {})\n{}",
            source_type_label(result.source_type),
            result.source,
            confidence_label(result.score),
            result.text
        ));
        if !sources.contains(&result.source) {
            sources.push(result.source.clone());
        }
    }

    (blocks.join("\n\n"), sources)
}

/// Build the full hand-off for the generative layer from one query and its
/// ranked results.
pub fn grounded_context(query: &str, results: &[RetrievalResult]) -> GroundedContext {
    let (grounding_block, sources) = assemble_context(results);
    GroundedContext {
        has_context: !results.is_empty(),
        grounding_block,
        sources,
        intent: classify_intent(query).as_str().to_string(),
    }
}
