//! Word-window chunking of source text.

use serde::Serialize;
use tracing::debug;

use exampaper_shared::DefaultsConfig;

/// One window of source text. `id` is the chunk's index and becomes the
/// `source_unit_id` of every question generated from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    pub id: usize,
    pub text: String,
    pub word_count: usize,
}

/// Window sizes, in whitespace-separated words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub min_words: usize,
    pub max_words: usize,
    pub overlap_words: usize,
}

impl From<&DefaultsConfig> for ChunkOptions {
    fn from(config: &DefaultsConfig) -> Self {
        Self {
            min_words: config.chunk_min_words,
            max_words: config.chunk_max_words,
            overlap_words: config.chunk_overlap_words,
        }
    }
}

/// Split `text` into overlapping windows of at most `max` words.
///
/// Windows advance by `max - overlap`. Text of `max` words or fewer is a
/// single chunk. A final window shorter than `min` is folded into the one
/// before it, so the last chunk may exceed `max`.
pub fn chunk_text(text: &str, options: ChunkOptions) -> Vec<TextChunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let max = options.max_words.max(1);
    if words.len() <= max {
        return vec![make_chunk(0, &words)];
    }

    // An overlap as large as the window would never advance.
    let overlap = if options.overlap_words < max {
        options.overlap_words
    } else {
        0
    };
    let stride = max - overlap;

    // (start, end) word ranges.
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + max).min(words.len());
        let tail_too_short = end == words.len() && end - start < options.min_words;

        match ranges.last_mut() {
            Some(last) if tail_too_short => last.1 = end,
            _ => ranges.push((start, end)),
        }

        if end == words.len() {
            break;
        }
        start += stride;
    }

    debug!(words = words.len(), chunks = ranges.len(), stride, "text chunked");

    ranges
        .into_iter()
        .enumerate()
        .map(|(id, (start, end))| make_chunk(id, &words[start..end]))
        .collect()
}

fn make_chunk(id: usize, words: &[&str]) -> TextChunk {
    TextChunk {
        id,
        text: words.join(" "),
        word_count: words.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn opts(min: usize, max: usize, overlap: usize) -> ChunkOptions {
        ChunkOptions {
            min_words: min,
            max_words: max,
            overlap_words: overlap,
        }
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("  \n ", opts(5, 10, 2)).is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("a  b\nc", opts(5, 10, 2));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a b c");
        assert_eq!(chunks[0].word_count, 3);
        assert_eq!(chunks[0].id, 0);
    }

    #[test]
    fn test_windows_overlap_by_configured_amount() {
        // 25 words, max 10, overlap 2 → starts at 0, 8, 16; last window 16..25 (9 words).
        let chunks = chunk_text(&words(25), opts(5, 10, 2));
        let counts: Vec<_> = chunks.iter().map(|c| c.word_count).collect();
        assert_eq!(counts, vec![10, 10, 9]);
        assert!(chunks[1].text.starts_with("w8 w9 "));
        assert!(chunks[2].text.starts_with("w16 "));
        let ids: Vec<_> = chunks.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_short_tail_merges_into_previous() {
        // 19 words, max 10, overlap 2 → 0..10, 8..18, then 16..19 is 3 words < 5.
        let chunks = chunk_text(&words(19), opts(5, 10, 2));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].word_count, 11);
        assert!(chunks[1].text.ends_with("w17 w18"));
        // No word duplicated inside the merged chunk.
        assert_eq!(chunks[1].text.matches("w16").count(), 1);
    }

    #[test]
    fn test_oversized_overlap_does_not_loop() {
        let chunks = chunk_text(&words(30), opts(1, 10, 10));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_defaults_from_config() {
        let options = ChunkOptions::from(&DefaultsConfig::default());
        assert_eq!(options, opts(500, 800, 100));
    }
}
