//! Boundary-aware sliding-window text chunker.
//!
//! Splits whitespace-normalized text into overlapping segments sized for
//! retrieval. A window of [`TARGET_CHUNK_CHARS`] advances through the text;
//! before each cut the window edge backs up to the nearest sentence
//! terminator, falling back to the nearest space, but only accepts a
//! boundary past the window midpoint so no degenerate tiny chunk is
//! produced. Consecutive chunks share a [`CHUNK_OVERLAP_CHARS`] band.
//!
//! Chunking is fully deterministic: identical input always yields identical
//! boundaries.

/// Window size the chunker aims for, in bytes of normalized text.
pub const TARGET_CHUNK_CHARS: usize = 1000;

/// Context band shared between consecutive chunks.
pub const CHUNK_OVERLAP_CHARS: usize = 100;

/// Chunks shorter than this are noise, not content, and are discarded.
/// The only exception is a whole input below the floor, which is returned
/// as a single chunk untouched.
pub const MIN_CHUNK_CHARS: usize = 20;

/// Collapse all whitespace runs to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into overlapping, boundary-aware segments.
///
/// Whitespace is normalized first. Empty input yields no chunks; input no
/// larger than `target` is returned whole. Every returned chunk is an exact
/// substring of the normalized text.
pub fn chunk_text(text: &str, target: usize, overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    if normalized.len() <= target {
        return vec![normalized];
    }

    let len = normalized.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = snap_to_char_boundary(&normalized, (start + target).min(len));
        if end < len {
            let window = &normalized[start..end];
            let midpoint = window.len() / 2;
            let cut = window
                .rfind(|c: char| matches!(c, '.' | '!' | '?'))
                .filter(|&pos| pos > midpoint)
                .or_else(|| window.rfind(' ').filter(|&pos| pos > midpoint));
            if let Some(pos) = cut {
                // keep the boundary character with the earlier chunk
                end = start + pos + 1;
            }
        }

        let piece = &normalized[start..end];
        if piece.len() >= MIN_CHUNK_CHARS {
            chunks.push(piece.to_string());
        }

        if end >= len {
            break;
        }
        start = snap_to_char_boundary(&normalized, end.saturating_sub(overlap));
    }

    chunks
}

/// Chunk with the default window and overlap.
pub fn chunk_default(text: &str) -> Vec<String> {
    chunk_text(text, TARGET_CHUNK_CHARS, CHUNK_OVERLAP_CHARS)
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
