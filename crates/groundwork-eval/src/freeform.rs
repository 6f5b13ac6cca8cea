//! Free-form answer scoring against document text.
//!
//! Scoring is lexical: both texts become term-frequency vectors and the
//! answer is scored by their cosine similarity. No model call is made, so the
//! result is deterministic and cheap enough to run for every submitted answer.

use std::collections::BTreeMap;

use crate::EvaluationResult;

/// Maximum number of answer tokens considered.
pub const MAX_ANSWER_TOKENS: usize = 500;

/// Maximum number of document tokens considered.
pub const MAX_DOCUMENT_TOKENS: usize = 5000;

/// Number of document sentences returned as suggestions.
pub const MAX_SUGGESTIONS: usize = 3;

// ============================================================================
// Feedback tiers
// ============================================================================

/// Coarse quality band for a free-form score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTier {
    /// Score of 85 or more.
    Excellent,
    /// Score of 60 or more.
    Good,
    /// Score of 35 or more.
    Partial,
    /// Anything lower.
    Insufficient,
}

impl FeedbackTier {
    /// Returns the tier for a 0-100 score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            85.. => Self::Excellent,
            60..=84 => Self::Good,
            35..=59 => Self::Partial,
            _ => Self::Insufficient,
        }
    }

    /// Returns the feedback message shown to the candidate.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent: closely matches document content.",
            Self::Good => "Good: covers several relevant points from the document.",
            Self::Partial => "Partial: includes some relevant points but misses key content.",
            Self::Insufficient => {
                "Insufficient: key information appears missing from your answer."
            }
        }
    }
}

// ============================================================================
// Text processing
// ============================================================================

/// Splits text into lowercase alphanumeric tokens.
///
/// Every character that is not an ASCII letter or digit acts as a separator.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Splits text into sentences after `.`, `!` or `?` followed by whitespace.
///
/// Empty fragments are dropped and every sentence is trimmed.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_i, next)) = chars.peek() {
            if next.is_whitespace() {
                push_sentence(&mut sentences, &text[start..next_i]);
                start = next_i;
            }
        }
    }
    push_sentence(&mut sentences, &text[start..]);

    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, fragment: &'a str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
}

fn term_frequencies(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut freq = BTreeMap::new();
    for token in tokens {
        *freq.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    freq
}

fn magnitude(freq: &BTreeMap<&str, f64>) -> f64 {
    freq.values().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine similarity of the term-frequency vectors of two token lists.
///
/// Returns `0.0` if either list is empty.
#[must_use]
pub fn cosine_similarity(a: &[String], b: &[String]) -> f64 {
    let a = term_frequencies(a);
    let b = term_frequencies(b);

    let denom = magnitude(&a) * magnitude(&b);
    if denom == 0.0 {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    dot / denom
}

// ============================================================================
// Evaluation
// ============================================================================

/// Scores a free-form answer against the document it should be drawn from.
///
/// The answer is capped at [`MAX_ANSWER_TOKENS`] tokens and the document at
/// [`MAX_DOCUMENT_TOKENS`]. Suggestions are the document sentences most
/// similar to the answer, best first; ties keep document order.
#[must_use]
pub fn evaluate_freeform_answer(answer: &str, document_text: &str) -> EvaluationResult {
    let mut answer_tokens = tokenize(answer);
    answer_tokens.truncate(MAX_ANSWER_TOKENS);
    let mut document_tokens = tokenize(document_text);
    document_tokens.truncate(MAX_DOCUMENT_TOKENS);

    let similarity = cosine_similarity(&answer_tokens, &document_tokens);

    let mut ranked: Vec<(&str, f64)> = split_sentences(document_text)
        .into_iter()
        .map(|s| (s, cosine_similarity(&answer_tokens, &tokenize(s))))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let suggestions = ranked
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(s, _)| s.to_string())
        .collect();

    let score = to_score(similarity);

    EvaluationResult {
        score,
        similarity,
        feedback: FeedbackTier::from_score(score).message().to_string(),
        suggestions,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_score(similarity: f64) -> u8 {
    (similarity.clamp(0.0, 1.0) * 100.0).round() as u8
}
