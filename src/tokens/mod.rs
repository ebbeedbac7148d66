//! Deterministic token estimation.
//!
//! Approximates a byte-pair tokenizer without shipping a vocabulary. Pieces
//! never merge across whitespace, so appending a whitespace-separated word to
//! a text never lowers its estimate.

const LETTERS_PER_TOKEN: usize = 4;
const DIGITS_PER_TOKEN: usize = 3;

#[derive(Clone, Copy, PartialEq)]
enum Run {
    None,
    Letters,
    Digits,
    Newlines,
}

/// Estimate how many language-model tokens `text` consumes.
///
/// - a run of ASCII letters costs one token per started four letters
/// - a run of digits costs one token per started three digits
/// - every other non-whitespace character costs one token
/// - each run of newlines costs one token; other whitespace is free
pub fn estimate_tokens(text: &str) -> usize {
    let mut tokens = 0;
    let mut run = Run::None;
    let mut run_len = 0usize;

    let flush = |run: Run, len: usize| -> usize {
        match run {
            Run::Letters => len.div_ceil(LETTERS_PER_TOKEN),
            Run::Digits => len.div_ceil(DIGITS_PER_TOKEN),
            Run::Newlines => 1,
            Run::None => 0,
        }
    };

    for c in text.chars() {
        let next = if c.is_ascii_alphabetic() {
            Run::Letters
        } else if c.is_ascii_digit() {
            Run::Digits
        } else if c == '\n' {
            Run::Newlines
        } else {
            Run::None
        };

        if next != run {
            tokens += flush(run, run_len);
            run = next;
            run_len = 0;
        }

        match next {
            Run::None if !c.is_whitespace() => tokens += 1,
            Run::None => {}
            _ => run_len += 1,
        }
    }

    tokens + flush(run, run_len)
}
