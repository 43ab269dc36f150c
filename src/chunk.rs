//! Overlapping-window text chunker.
//!
//! Splits lesson body text into fixed-size character windows that advance at
//! a stride of `chunk_size - chunk_overlap`, so consecutive chunks share
//! exactly `chunk_overlap` characters. The final window is truncated to
//! whatever remains, never padded.
//!
//! Window boundaries prefer not to cut mid-sentence: when a sentence
//! terminator falls within the last `chunk_overlap` characters of a window,
//! the boundary is nudged backward to it. Boundaries are never pushed past
//! the window's hard end.
//!
//! Each chunk receives a deterministic SHA-256 id derived from its
//! provenance and text, so re-ingesting an unchanged course produces the
//! same ids.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split a lesson body into overlapping windows of `chunk_size` characters.
///
/// An empty body yields no chunks; a body no longer than `chunk_size` yields
/// exactly one chunk equal to the whole body. `chunk_overlap` must be less
/// than `chunk_size` (enforced by config validation).
pub fn chunk_text(body: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();

    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= chunk_size {
        return vec![body.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + chunk_size).min(chars.len());
        let mut end = hard_end;

        if hard_end < chars.len() {
            if let Some(nudged) = sentence_end_in_zone(&chars, hard_end, chunk_overlap) {
                // Only accept the nudge if the next window still advances.
                if nudged > start + chunk_overlap {
                    end = nudged;
                }
            }
        }

        chunks.push(chars[start..end].iter().collect());

        if end == chars.len() {
            break;
        }
        start = end - chunk_overlap;
    }

    chunks
}

/// Find the boundary just after the last sentence terminator within the
/// final `overlap` characters of the window ending at `hard_end`.
fn sentence_end_in_zone(chars: &[char], hard_end: usize, overlap: usize) -> Option<usize> {
    let zone_start = hard_end.saturating_sub(overlap);
    (zone_start..hard_end)
        .rev()
        .find(|&i| matches!(chars[i], '.' | '!' | '?'))
        .map(|i| i + 1)
}

/// Build a [`Chunk`] with a deterministic id.
pub fn make_chunk(course_title: &str, lesson_number: i64, chunk_index: i64, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(course_title.as_bytes());
    hasher.update(lesson_number.to_le_bytes());
    hasher.update(chunk_index.to_le_bytes());
    hasher.update(text.as_bytes());
    let id = format!("{:x}", hasher.finalize());

    Chunk {
        id,
        course_title: course_title.to_string(),
        lesson_number,
        chunk_index,
        text,
    }
}
