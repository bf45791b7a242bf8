//! Deterministic text chunking.
//!
//! Splits on blank-line paragraph boundaries first, carrying a trailing
//! overlap into the next chunk. Chunks that still exceed the size limit are
//! re-split on sentence boundaries, and any single oversize sentence is
//! hard-split into fixed-length slices. Lengths are counted in characters,
//! not bytes, so multi-byte text never splits inside a code point.

/// Paragraph/sentence/fixed-slice splitter with a trailing-overlap window.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap_size: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, overlap_size: usize) -> Self {
        Self {
            chunk_size,
            overlap_size,
        }
    }

    /// Split `text` into chunks of at most `chunk_size` characters.
    ///
    /// Empty input yields an empty vec. Pure and deterministic.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for paragraph in text.split("\n\n") {
            if char_len(&current) + char_len(paragraph) > self.chunk_size {
                if !current.trim().is_empty() {
                    chunks.push(current.trim().to_string());
                }

                // Seed the next chunk with the tail of the one just flushed.
                if self.overlap_size > 0 {
                    let mut next = tail_chars(&current, self.overlap_size).to_string();
                    next.push_str(paragraph);
                    current = next;
                } else {
                    current = paragraph.to_string();
                }
            } else {
                current.push_str("\n\n");
                current.push_str(paragraph);
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        // Post-pass: anything still oversize degrades to sentence splitting.
        let mut final_chunks = Vec::new();
        for chunk in chunks {
            if char_len(&chunk) <= self.chunk_size {
                final_chunks.push(chunk);
            } else {
                final_chunks.extend(self.split_by_sentences(&chunk));
            }
        }

        final_chunks
    }

    fn split_by_sentences(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for sentence in split_sentences(text) {
            if char_len(&current) + char_len(sentence) <= self.chunk_size {
                if current.is_empty() {
                    current.push_str(sentence);
                } else {
                    current.push(' ');
                    current.push_str(sentence);
                }
            } else {
                if !current.trim().is_empty() {
                    chunks.push(current.trim().to_string());
                }

                if char_len(sentence) > self.chunk_size {
                    let mut slices = self.split_long_sentence(sentence);
                    current = slices.pop().unwrap_or_default();
                    chunks.extend(slices);
                } else {
                    current = sentence.to_string();
                }
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }

    /// Floor granularity: fixed-length character slices, no overlap.
    fn split_long_sentence(&self, sentence: &str) -> Vec<String> {
        if char_len(sentence) <= self.chunk_size {
            return vec![sentence.to_string()];
        }

        let chars: Vec<char> = sentence.chars().collect();
        chars
            .chunks(self.chunk_size.max(1))
            .map(|slice| slice.iter().collect())
            .collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s` (the whole string if shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if len <= n {
        return s;
    }
    match s.char_indices().nth(len - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Split after `.`, `!` or `?` followed by whitespace; the punctuation stays
/// with the preceding sentence and the whitespace run is dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;

    for (idx, ch) in text.char_indices() {
        if prev_terminal && ch.is_whitespace() {
            if start < idx {
                sentences.push(&text[start..idx]);
            }
            start = idx + ch.len_utf8();
            prev_terminal = false;
            continue;
        }
        if ch.is_whitespace() && start == idx {
            // Still consuming the whitespace run after a boundary.
            start = idx + ch.len_utf8();
            continue;
        }
        prev_terminal = matches!(ch, '.' | '!' | '?');
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}
