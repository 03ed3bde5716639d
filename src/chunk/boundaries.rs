//! Break-point selection for the chunker
//!
//! Prefers paragraph breaks, then sentence ends, then any whitespace,
//! always cutting on a UTF-8 character boundary.

/// Cut preference, strongest last
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BreakPriority {
    Word,
    Sentence,
    Paragraph,
}

const SENTENCE_ENDS: [&str; 6] = [". ", ".\n", "? ", "?\n", "! ", "!\n"];

/// Find the best break inside `window`, no earlier than byte offset
/// `min_pos`. Returns the byte position just past the separator, so
/// the cut keeps the punctuation with the preceding chunk.
pub fn best_break(window: &str, min_pos: usize) -> Option<(usize, BreakPriority)> {
    if let Some(pos) = window.rfind("\n\n") {
        if pos >= min_pos {
            return Some((pos + 2, BreakPriority::Paragraph));
        }
    }

    let sentence = SENTENCE_ENDS
        .iter()
        .filter_map(|end| window.rfind(end).map(|pos| pos + end.len()))
        .max();
    if let Some(pos) = sentence {
        if pos > min_pos {
            return Some((pos, BreakPriority::Sentence));
        }
    }

    if let Some(pos) = window.rfind(char::is_whitespace) {
        if pos > min_pos {
            return Some((pos + 1, BreakPriority::Word));
        }
    }

    None
}

/// Round a byte index down to the nearest character boundary
pub fn ensure_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Byte index `n` characters past `start`, clamped to the text end
pub fn advance_chars(text: &str, start: usize, n: usize) -> usize {
    text[start..]
        .char_indices()
        .nth(n)
        .map(|(offset, _)| start + offset)
        .unwrap_or(text.len())
}

/// Byte index `n` characters before `end`
pub fn retreat_chars(text: &str, end: usize, n: usize) -> usize {
    let mut index = end;
    for _ in 0..n {
        match text[..index].char_indices().next_back() {
            Some((offset, _)) => index = offset,
            None => return 0,
        }
    }
    index
}
