//! Text chunking
//!
//! Splits cleaned document text into overlapping chunks sized for the
//! embedding provider. Cuts land on paragraph or sentence boundaries
//! when one falls late enough in the window, and on whitespace
//! otherwise; a window of solid text is cut hard at the limit.

mod boundaries;

pub use boundaries::{ensure_char_boundary, BreakPriority};

use crate::config::ChunkConfig;
use boundaries::{advance_chars, best_break, retreat_chars};
use tracing::debug;

/// Split text into chunks per the given configuration.
///
/// Chunks are trimmed and non-empty, in document order. Consecutive
/// chunks share up to `overlap_chars` characters of context.
pub fn split(text: &str, config: &ChunkConfig) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let max_chars = config.max_chars.max(1);
    let overlap = config.overlap_chars.min(max_chars.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let end = advance_chars(text, start, max_chars);
        if end >= text.len() {
            push_chunk(&mut chunks, &text[start..]);
            break;
        }

        let window = &text[start..end];
        let min_pos = advance_chars(
            window,
            0,
            (max_chars as f32 * config.min_break_fraction) as usize,
        );
        let cut = match best_break(window, min_pos) {
            Some((pos, _)) => start + pos,
            None => end,
        };

        push_chunk(&mut chunks, &text[start..cut]);

        let next = ensure_char_boundary(text, retreat_chars(text, cut, overlap));
        // overlap must never stall the walk
        start = if next > start { next } else { cut };
    }

    debug!(chunks = chunks.len(), chars = text.len(), "Split text");
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkConfig {
        ChunkConfig {
            max_chars,
            overlap_chars,
            min_break_fraction: 0.5,
        }
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = split("Just a short note.", &config(1000, 200));
        assert_eq!(chunks, vec!["Just a short note.".to_string()]);
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        assert!(split("", &config(100, 10)).is_empty());
        assert!(split("   \n\n  ", &config(100, 10)).is_empty());
    }

    #[test]
    fn test_every_chunk_respects_max_chars() {
        let text = "word ".repeat(500);
        let cfg = config(100, 20);
        let chunks = split(&text, &cfg);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= cfg.max_chars);
        }
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let text = format!("{}. {}", "a".repeat(70), "b".repeat(70));
        let chunks = split(&text, &config(100, 0));
        assert_eq!(chunks[0], format!("{}.", "a".repeat(70)));
    }

    #[test]
    fn test_prefers_paragraph_over_sentence() {
        let text = format!("{}.\n\n{}", "a".repeat(60), "b".repeat(80));
        let chunks = split(&text, &config(100, 0));
        assert_eq!(chunks[0], format!("{}.", "a".repeat(60)));
        assert_eq!(chunks[1], "b".repeat(80));
    }

    #[test]
    fn test_solid_text_is_cut_hard() {
        let text = "x".repeat(250);
        let chunks = split(&text, &config(100, 0));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = "word ".repeat(100);
        let chunks = split(&text, &config(100, 20));
        assert!(chunks.len() > 1);
        // the tail of each chunk reappears at the head of the next
        let tail: String = chunks[0].chars().rev().take(10).collect::<Vec<_>>().iter().rev().collect();
        assert!(chunks[1].starts_with(tail.trim_start()));
    }

    #[test]
    fn test_chunks_reproduce_source_modulo_overlap() {
        let sentences: Vec<String> = (0..120)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i % 7))
            .collect();
        let text = sentences.join(" ");
        let cfg = config(200, 40);
        let chunks = split(&text, &cfg);
        assert!(chunks.len() > 1);

        // no sentence is ever split or dropped
        for sentence in &sentences {
            assert!(
                chunks.iter().any(|c| c.contains(sentence.as_str())),
                "sentence lost across chunk boundaries: {}",
                sentence
            );
        }

        // any window shorter than the overlap survives intact in some
        // chunk, so concatenating chunks in index order covers the
        // whole source
        let window = 30;
        let mut start = 0;
        while start + window <= text.len() {
            let needle = &text[start..start + window];
            assert!(
                chunks.iter().any(|c| c.contains(needle)),
                "source text lost near byte {}: {:?}",
                start,
                needle
            );
            start += 13;
        }
    }

    #[test]
    fn test_multibyte_text_never_panics() {
        let text = "héllo wörld ünïcode ".repeat(50);
        let chunks = split(&text, &config(64, 16));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 64);
        }
    }

    #[test]
    fn test_forward_progress_with_large_overlap() {
        let text = "ab ".repeat(200);
        // overlap nearly as large as the window
        let chunks = split(&text, &config(10, 9));
        assert!(chunks.len() < text.len());
        assert!(!chunks.is_empty());
    }
}
