/// Sentence-aware chunker. Sizes are counted in whitespace-separated words.
#[derive(Debug, Clone, Copy)]
pub struct SentenceSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…' | '。')
}

/// Splits on sentence terminators followed by whitespace and on blank lines.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let next = chars.peek().map(|(_, n)| *n);
        let boundary = match next {
            Some(n) if is_terminator(c) && n.is_whitespace() => true,
            Some('\n') if c == '\n' => true,
            _ => false,
        };
        if boundary {
            let end = idx + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

impl SentenceSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chunk_size = self.chunk_size.max(1);
        let overlap = self.chunk_overlap.min(chunk_size - 1);

        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        // words in `current` that came from the previous chunk
        let mut carried = 0;

        for sentence in split_sentences(text) {
            let words: Vec<&str> = sentence.split_whitespace().collect();

            if words.len() > chunk_size {
                if current.len() > carried {
                    chunks.push(current.join(" "));
                }
                current.clear();
                let step = chunk_size - overlap;
                let mut offset = 0;
                loop {
                    let end = (offset + chunk_size).min(words.len());
                    chunks.push(words[offset..end].join(" "));
                    if end == words.len() {
                        break;
                    }
                    offset += step;
                }
                let keep = overlap.min(words.len());
                current.extend_from_slice(&words[words.len() - keep..]);
                carried = current.len();
                continue;
            }

            if current.len() + words.len() > chunk_size {
                if current.len() > carried {
                    chunks.push(current.join(" "));
                    let keep = overlap.min(current.len());
                    let tail: Vec<&str> = current[current.len() - keep..].to_vec();
                    current = tail;
                    carried = current.len();
                }
                // the overlap must leave room for the next sentence
                while !current.is_empty() && current.len() + words.len() > chunk_size {
                    current.remove(0);
                    carried = carried.saturating_sub(1);
                }
            }
            current.extend_from_slice(&words);
        }

        if current.len() > carried {
            chunks.push(current.join(" "));
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_count(s: &str) -> usize {
        s.split_whitespace().count()
    }

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = SentenceSplitter::new(50, 5);
        let chunks = splitter.split("First sentence. Second one!\n\nThird?");
        assert_eq!(chunks, vec!["First sentence. Second one! Third?"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let splitter = SentenceSplitter::new(10, 2);
        assert!(splitter.split("   \n\n ").is_empty());
    }

    #[test]
    fn sentences_split_on_terminators() {
        assert_eq!(split_sentences("A b. C d? E"), vec!["A b.", "C d?", "E"]);
        assert_eq!(split_sentences("v1.2 is out. ok"), vec!["v1.2 is out.", "ok"]);
        assert_eq!(split_sentences("para one\n\npara two"), vec!["para one", "para two"]);
    }

    #[test]
    fn chunks_respect_size_and_carry_overlap() {
        let splitter = SentenceSplitter::new(6, 2);
        let text = "one two three. four five six. seven eight nine. ten eleven twelve.";
        let chunks = splitter.split(text);
        for chunk in &chunks {
            assert!(word_count(chunk) <= 6, "chunk too long: {}", chunk);
        }
        assert_eq!(chunks[0], "one two three. four five six.");
        assert!(chunks[1].starts_with("five six."));
        assert!(chunks.last().unwrap().ends_with("ten eleven twelve."));
    }

    #[test]
    fn long_sentence_is_hard_split_with_overlap() {
        let splitter = SentenceSplitter::new(4, 1);
        let text = "a b c d e f g h i j";
        let chunks = splitter.split(text);
        assert_eq!(chunks, vec!["a b c d", "d e f g", "g h i j"]);
    }

    #[test]
    fn overlap_shrinks_to_fit_next_sentence() {
        let splitter = SentenceSplitter::new(6, 2);
        let chunks = splitter.split("a b c d e f. g h i j k.");
        assert_eq!(chunks, vec!["a b c d e f.", "f. g h i j k."]);
    }

    #[test]
    fn every_word_is_kept() {
        let splitter = SentenceSplitter::new(5, 0);
        let text = "alpha beta. gamma delta epsilon. zeta eta theta iota kappa lambda. mu.";
        let joined = splitter.split(text).join(" ");
        assert_eq!(word_count(&joined), word_count(text));
    }
}
