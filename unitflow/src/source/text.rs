//! Plain text splitting.

use crate::job::Unit;

/// Separator between paragraphs, and between chunks in merged output.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Splits text into chunks on paragraph boundaries.
///
/// Paragraphs (separated by a blank line) are packed greedily: a paragraph
/// joins the current chunk while the chunk stays under `chunk_size` bytes.
/// A single paragraph larger than `chunk_size` becomes a chunk of its own
/// and is not cut. Chunks are trimmed; empty ones are skipped.
///
/// ```
/// use unitflow::source::split_text;
///
/// let chunks = split_text("one\n\ntwo\n\nthree", 10);
/// assert_eq!(chunks, vec!["one\n\ntwo", "three"]);
/// ```
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        if current.len() + paragraph.len() < chunk_size {
            current.push_str(paragraph);
            current.push_str(PARAGRAPH_SEPARATOR);
        } else {
            push_trimmed(&mut chunks, &current);
            current.clear();
            current.push_str(paragraph);
            current.push_str(PARAGRAPH_SEPARATOR);
        }
    }
    push_trimmed(&mut chunks, &current);

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Splits text into units numbered from zero.
pub fn units_from_text(text: &str, chunk_size: usize) -> Vec<Unit> {
    split_text(text, chunk_size)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| Unit::new(i as u64, chunk))
        .collect()
}
