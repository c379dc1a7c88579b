//! Query/chunk feature extraction: deterministic embeddings and
//! keyword/phrase sets.
//!
//! The embedding is a hashed character/word feature vector, not a learned
//! representation. It is a deliberate cost/latency trade-off: fully
//! deterministic, reproducible across processes, and cheap enough to run
//! inline at ingestion and query time. Swapping in a learned model later
//! only requires honoring the same `embed(text) -> vector` contract.
//!
//! # Embedding synthesis
//!
//! 1. Lowercase the text.
//! 2. Collect features: every 1/2/3-character window over the whole string,
//!    each whitespace token, and the 3-char prefix and suffix of tokens
//!    longer than 3 characters.
//! 3. Hash each feature twice (wrapping polynomial hashes over UTF-8 bytes,
//!    multipliers 31 and 131) and vote into the vector at `h1 % D`,
//!    `h2 % D`, and `(h1 + h2) % D` with weights 1.0, 0.5, 0.25.
//! 4. L2-normalize. Empty input stays the zero vector.

use crate::models::QueryFeatures;

/// Dimensionality of the deterministic embedding.
pub const EMBEDDING_DIMS: usize = 384;

/// Multipliers for the two independent feature hashes. Changing either
/// invalidates every stored vector.
const HASH_MULT_PRIMARY: u64 = 31;
const HASH_MULT_SECONDARY: u64 = 131;

const PRIMARY_WEIGHT: f32 = 1.0;
const SECONDARY_WEIGHT: f32 = 0.5;
const COMBINED_WEIGHT: f32 = 0.25;

/// Tokens this short carry no retrieval signal.
const MIN_TOKEN_CHARS: usize = 2;

/// Articles, auxiliaries, pronouns, and greeting/politeness words removed
/// from keyword sets.
const STOPWORDS: &[&str] = &[
    "the", "and", "are", "was", "were", "been", "being", "has", "have", "had",
    "does", "did", "will", "would", "shall", "should", "can", "could", "may",
    "might", "must", "you", "your", "yours", "she", "her", "hers", "him",
    "his", "its", "our", "ours", "they", "them", "their", "theirs", "this",
    "that", "these", "those", "what", "which", "who", "whom", "with", "for",
    "from", "into", "about", "but", "not", "any", "all", "some", "there",
    "here", "when", "where", "why", "how", "hello", "get", "got", "just",
    "hey", "please", "thanks", "thank", "welcome", "greetings", "goodbye",
    "bye", "okay",
];

/// Compute the deterministic embedding at the default dimensionality.
pub fn embed(text: &str) -> Vec<f32> {
    embed_with_dims(text, EMBEDDING_DIMS)
}

/// Compute the deterministic embedding at an explicit dimensionality.
///
/// Reproducible bit-for-bit across calls and processes for a given
/// `(text, dims)` pair. Empty (or whitespace-only) input yields the zero
/// vector; every other input is L2-normalized.
pub fn embed_with_dims(text: &str, dims: usize) -> Vec<f32> {
    let dims = dims.max(1);
    let mut vector = vec![0f32; dims];

    let lowered = text.to_lowercase();
    let lowered = lowered.trim();
    if lowered.is_empty() {
        return vector;
    }

    let chars: Vec<char> = lowered.chars().collect();
    let mut feature = String::new();
    for n in 1..=3usize {
        for window in chars.windows(n) {
            feature.clear();
            feature.extend(window.iter());
            vote(&mut vector, &feature);
        }
    }

    for token in lowered.split_whitespace() {
        vote(&mut vector, token);
        let token_chars: Vec<char> = token.chars().collect();
        if token_chars.len() > 3 {
            let prefix: String = token_chars[..3].iter().collect();
            let suffix: String = token_chars[token_chars.len() - 3..].iter().collect();
            vote(&mut vector, &prefix);
            vote(&mut vector, &suffix);
        }
    }

    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for v in &mut vector {
            *v /= magnitude;
        }
    }
    vector
}

fn vote(vector: &mut [f32], feature: &str) {
    let dims = vector.len() as u64;
    let h1 = feature_hash(feature, HASH_MULT_PRIMARY);
    let h2 = feature_hash(feature, HASH_MULT_SECONDARY);
    vector[(h1 % dims) as usize] += PRIMARY_WEIGHT;
    vector[(h2 % dims) as usize] += SECONDARY_WEIGHT;
    vector[(h1.wrapping_add(h2) % dims) as usize] += COMBINED_WEIGHT;
}

fn feature_hash(feature: &str, multiplier: u64) -> u64 {
    let mut hash: u64 = 0;
    for byte in feature.bytes() {
        hash = hash.wrapping_mul(multiplier).wrapping_add(byte as u64);
    }
    hash
}

/// Lowercase, strip punctuation to whitespace, and keep tokens longer than
/// [`MIN_TOKEN_CHARS`]. Shared by keyword extraction and keyword scoring so
/// both sides tokenize identically.
pub fn tokenize(text: &str) -> Vec<String> {
    flatten(text)
        .split_whitespace()
        .filter(|t| t.chars().count() > MIN_TOKEN_CHARS)
        .map(|t| t.to_string())
        .collect()
}

/// Lowercase, replace every non-alphanumeric character with a space, and
/// collapse the resulting whitespace runs. Used for substring phrase
/// matching against chunk text.
pub fn flatten(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Extract the deduplicated keyword and phrase sets from a text.
///
/// Keywords are non-stopword tokens; phrases are all adjacent 2- and 3-token
/// windows in which every token is a non-stopword. Both preserve first-seen
/// order.
pub fn extract_keywords(text: &str) -> (Vec<String>, Vec<String>) {
    let tokens = tokenize(text);

    let mut keywords = Vec::new();
    for token in &tokens {
        if !is_stopword(token) && !keywords.contains(token) {
            keywords.push(token.clone());
        }
    }

    let mut phrases = Vec::new();
    for width in [2usize, 3] {
        for window in tokens.windows(width) {
            if window.iter().all(|t| !is_stopword(t)) {
                let phrase = window.join(" ");
                if !phrases.contains(&phrase) {
                    phrases.push(phrase);
                }
            }
        }
    }

    (keywords, phrases)
}

/// Derive everything the retrieval stages need from one incoming question.
pub fn query_features(text: &str) -> QueryFeatures {
    let (keywords, phrases) = extract_keywords(text);
    QueryFeatures {
        embedding: embed(text),
        keywords,
        phrases,
    }
}

/// Cosine similarity between two vectors. Empty or mismatched vectors
/// score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Encode a vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let a = embed("How do I reset my password?");
        let b = embed("How do I reset my password?");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIMS);
    }

    #[test]
    fn embedding_is_unit_length() {
        let v = embed("enterprise pricing tiers");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {}", norm);
    }

    #[test]
    fn empty_input_is_zero_vector() {
        assert!(embed("").iter().all(|&v| v == 0.0));
        assert!(embed("   \t ").iter().all(|&v| v == 0.0));
    }

    #[test]
    fn related_texts_score_higher_than_unrelated() {
        let query = embed("pricing plans and subscription costs");
        let related = embed("our pricing plans include a free subscription tier");
        let unrelated = embed("the office is closed on public holidays");
        assert!(
            cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated)
        );
    }

    #[test]
    fn case_does_not_change_the_vector() {
        assert_eq!(embed("Refund Policy"), embed("refund policy"));
    }

    #[test]
    fn custom_dims_are_honored() {
        assert_eq!(embed_with_dims("abc", 64).len(), 64);
    }

    #[test]
    fn keywords_drop_stopwords_and_short_tokens() {
        let (keywords, _) = extract_keywords("How do I reset the password?");
        assert!(keywords.contains(&"reset".to_string()));
        assert!(keywords.contains(&"password".to_string()));
        assert!(!keywords.contains(&"the".to_string()));
        assert!(!keywords.contains(&"how".to_string()));
        assert!(!keywords.contains(&"i".to_string()));
        assert!(!keywords.contains(&"do".to_string()));
    }

    #[test]
    fn phrases_require_all_non_stopwords() {
        let (_, phrases) = extract_keywords("reset your account password today");
        assert!(phrases.contains(&"account password".to_string()));
        assert!(phrases.contains(&"account password today".to_string()));
        assert!(!phrases.iter().any(|p| p.contains("your")));
    }

    #[test]
    fn phrases_are_deduplicated() {
        let (_, phrases) = extract_keywords("refund policy refund policy");
        let count = phrases.iter().filter(|p| *p == "refund policy").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn punctuation_becomes_whitespace() {
        let (keywords, _) = extract_keywords("billing, invoices; payment-methods");
        assert!(keywords.contains(&"billing".to_string()));
        assert!(keywords.contains(&"payment".to_string()));
        assert!(keywords.contains(&"methods".to_string()));
    }

    #[test]
    fn blob_round_trip() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        let v = vec![0.6f32, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
