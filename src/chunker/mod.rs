use std::ops::Range;

use crate::tokens::estimate_tokens;

/// A token-bounded, contiguous slice of transcript words
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position of the chunk in transcript order
    pub index: usize,

    /// Chunk words joined by single spaces
    pub text: String,

    /// Word indices of the chunk within the source text
    pub words: Range<usize>,

    /// Estimated tokens of `text`
    pub estimated_tokens: usize,
}

/// Split `text` into chunks of roughly `token_limit` tokens using the
/// default estimator.
pub fn chunk(text: &str, token_limit: usize) -> Vec<Chunk> {
    chunk_with(text, token_limit, estimate_tokens)
}

/// Split `text` into word-aligned chunks.
///
/// Words are appended one at a time and the growing chunk is re-estimated
/// after every word; the chunk is closed as soon as its estimate reaches
/// `token_limit`, so the word that crosses the limit stays in it. The final
/// partial chunk is always kept. Every step consumes a word, so a word that
/// alone exceeds the limit simply becomes a chunk of its own.
pub fn chunk_with<F>(text: &str, token_limit: usize, estimate: F) -> Vec<Chunk>
where
    F: Fn(&str) -> usize,
{
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (i, word) in text.split_whitespace().enumerate() {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);

        let estimated_tokens = estimate(&current);
        if estimated_tokens >= token_limit {
            chunks.push(Chunk {
                index: chunks.len(),
                text: std::mem::take(&mut current),
                words: start..i + 1,
                estimated_tokens,
            });
            start = i + 1;
        }
    }

    if !current.is_empty() {
        let word_count = current.split(' ').count();
        chunks.push(Chunk {
            index: chunks.len(),
            estimated_tokens: estimate(&current),
            words: start..start + word_count,
            text: current,
        });
    }

    tracing::debug!(
        "Split {} words into {} chunks (limit {} tokens)",
        chunks.last().map(|c| c.words.end).unwrap_or(0),
        chunks.len(),
        token_limit
    );

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_of(chunks: &[Chunk]) -> Vec<String> {
        chunks
            .iter()
            .flat_map(|c| c.text.split(' ').map(str::to_string))
            .collect()
    }

    fn word_count(text: &str) -> usize {
        text.split_whitespace().count()
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk("", 10).is_empty());
        assert!(chunk("  \n\t ", 10).is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk("just a few words", 3000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "just a few words");
        assert_eq!(chunks[0].words, 0..4);
    }

    #[test]
    fn test_closes_on_word_that_reaches_limit() {
        let chunks = chunk_with("a b c d e f g", 3, word_count);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b c", "d e f", "g"]);
        assert_eq!(chunks[1].words, 3..6);
        assert_eq!(chunks[2].words, 6..7);
        assert_eq!(chunks[2].estimated_tokens, 1);
    }

    #[test]
    fn test_oversized_word_forms_own_chunk() {
        let chunks = chunk("supercalifragilisticexpialidocious is long", 2);
        assert_eq!(chunks[0].text, "supercalifragilisticexpialidocious");
        assert_eq!(chunks[1].text, "is long");
        assert_eq!(chunks.len(), 2);

        let degenerate = chunk("one two three", 0);
        assert_eq!(degenerate.len(), 3);
    }

    #[test]
    fn test_preserves_word_sequence() {
        let text = "It was the best of times,\n it was the  worst of times; it was the age of wisdom.";
        for limit in [1, 2, 5, 9, 1000] {
            let chunks = chunk(text, limit);
            let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();
            assert_eq!(words_of(&chunks), original, "limit {limit}");
            assert!(chunks.iter().all(|c| !c.text.is_empty()));
            assert_eq!(chunks.last().unwrap().words.end, original.len());
            for (i, c) in chunks.iter().enumerate() {
                assert_eq!(c.index, i);
            }
        }
    }

    #[test]
    fn test_ten_thousand_tokens_at_three_thousand() {
        let text = vec!["word"; 10_000].join(" ");
        assert_eq!(estimate_tokens(&text), 10_000);

        let chunks = chunk(&text, 3000);
        assert_eq!(chunks.len(), 4);
        for c in &chunks[..3] {
            assert_eq!(c.estimated_tokens, 3000);
        }
        assert_eq!(chunks[3].estimated_tokens, 1000);
    }
}
