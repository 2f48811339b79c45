//! Splitting documents into overlapping chunks.

/// Split `text` into chunks of at most `chunk_size` characters, with
/// `overlap` characters shared between neighbours.
///
/// A chunk ends at the last whitespace in its second half when one exists,
/// so words are rarely cut. Whitespace-only chunks are dropped.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);
    let chars: Vec<char> = text.chars().collect();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            let min_end = start + chunk_size / 2;
            (min_end..hard_end)
                .rev()
                .find(|&i| chars[i].is_whitespace())
                .map(|i| i + 1)
                .unwrap_or(hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end == chars.len() {
            break;
        }
        // Always advance, even when the overlap would swallow the whole chunk.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}
