//! Weighted keyword/phrase scoring shared by the chunk and crawled-page
//! retrieval stages.
//!
//! Raw scores are unbounded; the retrieval engine divides by
//! [`SCORE_SCALE`] to bring them onto roughly the same scale as cosine
//! similarity before merging stages.

use crate::features::{flatten, tokenize};
use crate::models::QueryFeatures;

/// Exact phrase found as a substring of the (punctuation-flattened) text.
pub const PHRASE_WEIGHT: f32 = 5.0;
/// Keyword present as a whole token.
pub const TOKEN_WEIGHT: f32 = 2.0;
/// Keyword and a token contain one another, checked only when the exact
/// token test fails.
pub const PARTIAL_WEIGHT: f32 = 0.5;
/// Multiplier for the matched-keyword density bonus.
pub const DENSITY_WEIGHT: f32 = 3.0;
/// Flat bonus for texts long enough to carry reliable context.
pub const LONG_TEXT_BONUS: f32 = 1.0;
pub const LONG_TEXT_CHARS: usize = 200;

/// Raw keyword scores at or below this floor are dropped by the retrieval
/// engine.
pub const SCORE_FLOOR: f32 = 2.0;
/// Divisor normalizing raw keyword scores for cross-stage merging.
pub const SCORE_SCALE: f32 = 10.0;

/// Score a candidate text against the query's keyword and phrase sets.
///
/// Monotone in matches: adding an exact phrase occurrence to a text
/// strictly increases its score.
pub fn keyword_score(text: &str, features: &QueryFeatures) -> f32 {
    let flat = flatten(text);
    let tokens = tokenize(text);

    let mut score = 0.0f32;
    for phrase in &features.phrases {
        if flat.contains(phrase.as_str()) {
            score += PHRASE_WEIGHT;
        }
    }

    let mut matched = 0usize;
    for keyword in &features.keywords {
        if tokens.iter().any(|t| t == keyword) {
            score += TOKEN_WEIGHT;
            matched += 1;
        } else if tokens
            .iter()
            .any(|t| t.contains(keyword.as_str()) || keyword.contains(t.as_str()))
        {
            score += PARTIAL_WEIGHT;
            matched += 1;
        }
    }

    if !features.keywords.is_empty() {
        score += matched as f32 / features.keywords.len() as f32 * DENSITY_WEIGHT;
    }

    if text.chars().count() > LONG_TEXT_CHARS {
        score += LONG_TEXT_BONUS;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::query_features;

    #[test]
    fn phrase_match_strictly_increases_score() {
        let features = query_features("What are your enterprise pricing tiers?");
        let without = "Our product supports many integrations and exports.";
        let with = "Our product supports many integrations. See enterprise pricing tiers.";
        assert!(keyword_score(with, &features) > keyword_score(without, &features));
    }

    #[test]
    fn exact_token_beats_partial() {
        let features = query_features("refund");
        let exact = keyword_score("we offer a refund window", &features);
        let partial = keyword_score("refundable deposits only", &features);
        assert!(exact > partial);
        assert!(partial > 0.0);
    }

    #[test]
    fn partial_checked_only_after_exact_fails() {
        // "refund" appears as a whole token AND inside "refundable"; only
        // the exact weight is awarded once per keyword.
        let features = query_features("refund");
        let both = keyword_score("refund and refundable items", &features);
        let exact_only = keyword_score("refund items today", &features);
        assert_eq!(both, exact_only);
    }

    #[test]
    fn long_text_gets_flat_bonus() {
        let features = query_features("shipping policy");
        let short = "shipping policy overview";
        let long = format!("shipping policy overview {}", "filler words here ".repeat(20));
        let diff = keyword_score(&long, &features) - keyword_score(short, &features);
        assert!((diff - LONG_TEXT_BONUS).abs() < 1e-6);
    }

    #[test]
    fn density_bonus_scales_with_matched_fraction() {
        let features = query_features("alpha bravo charlie delta");
        // one of four keywords matched: 2 + 1/4 * 3
        let one = keyword_score("alpha only", &features);
        assert!((one - (TOKEN_WEIGHT + 0.25 * DENSITY_WEIGHT)).abs() < 1e-6);
        // all four matched: 4 * 2 + 3
        let all = keyword_score("alpha bravo charlie delta", &features);
        assert!((all - (4.0 * TOKEN_WEIGHT + DENSITY_WEIGHT)).abs() < 1e-6);
    }

    #[test]
    fn no_keywords_no_score() {
        let features = query_features("");
        assert_eq!(keyword_score("any text at all", &features), 0.0);
    }

    #[test]
    fn punctuation_does_not_break_phrase_matching() {
        let features = query_features("enterprise pricing tiers");
        let hit = keyword_score("Enterprise pricing: tiers for every team.", &features);
        assert!(hit >= PHRASE_WEIGHT);
    }
}
