//! Leading-sentences summarization.
//!
//! Deliberately naive: the summary is the first few sentences of the
//! transcript. Anything smarter belongs to an external collaborator.

/// Default number of sentences kept in a summary.
pub const DEFAULT_SUMMARY_SENTENCES: usize = 5;

/// Summarize text by keeping the first `num_sentences` sentences.
///
/// Sentences are delimited by `.`, `!` or `?` followed by whitespace.
/// Returns `None` for blank input or input with no sentence boundaries
/// and no content.
pub fn summarize_text(text: &str, num_sentences: usize) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || num_sentences == 0 {
        return None;
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars
                .peek()
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true);

        if at_boundary {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
            if sentences.len() == num_sentences {
                break;
            }
        }
    }

    // Trailing text without a terminator still counts as a sentence
    if sentences.len() < num_sentences {
        let rest = text[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest);
        }
    }

    if sentences.is_empty() {
        None
    } else {
        Some(sentences.join(" "))
    }
}
