//! Multiple-choice answer canonicalization and comparison.

use crate::AnswerValue;

/// Option letters in index order.
pub const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Words that may precede the letter. `answer` must come before `ans`.
const LABEL_WORDS: [&str; 4] = ["option", "answer", "choice", "ans"];

/// Canonicalizes an answer to an option letter `A` through `D`.
///
/// Accepts a zero-based index (`2` is `C`), a bare letter in either case
/// (`"c"`), or a letter followed by punctuation or text (`"C) Inertia"`,
/// `"(b)"`). The letter may follow a label word (`"Option B"`,
/// `"Answer: c"`). Returns `None` for anything else, including indexes
/// outside `0..=3` and words that merely start with a letter (`"Cat"`).
#[must_use]
pub fn option_letter(answer: &AnswerValue) -> Option<char> {
    match answer {
        AnswerValue::Index(index) => usize::try_from(*index)
            .ok()
            .and_then(|i| OPTION_LETTERS.get(i).copied()),
        AnswerValue::Text(text) => letter_from_text(text),
    }
}

fn letter_from_text(text: &str) -> Option<char> {
    let mut chars = strip_label(text).chars();

    let letter = chars.next()?.to_ascii_uppercase();
    if !OPTION_LETTERS.contains(&letter) {
        return None;
    }

    match chars.next() {
        Some(next) if next.is_alphanumeric() => None,
        _ => Some(letter),
    }
}

/// Skips leading punctuation and at most one label word.
fn strip_label(text: &str) -> &str {
    let text = text.trim_start_matches(|c: char| !c.is_alphanumeric());

    for label in LABEL_WORDS {
        let Some(head) = text.get(..label.len()) else {
            continue;
        };
        let rest = &text[label.len()..];
        if head.eq_ignore_ascii_case(label) && rest.starts_with(|c: char| !c.is_alphanumeric()) {
            return rest.trim_start_matches(|c: char| !c.is_alphanumeric());
        }
    }
    text
}

/// Compares a submitted multiple-choice answer with the correct one.
///
/// Both sides are canonicalized with [`option_letter`]. Two absent answers
/// match; one absent answer does not. Blank text counts as absent. If either
/// side fails to canonicalize the answers do not match.
#[must_use]
pub fn compare_mcq_answers(user: Option<&AnswerValue>, correct: Option<&AnswerValue>) -> bool {
    let user = user.filter(|a| !a.is_blank());
    let correct = correct.filter(|a| !a.is_blank());

    match (user, correct) {
        (None, None) => true,
        (Some(user), Some(correct)) => match (option_letter(user), option_letter(correct)) {
            (Some(u), Some(c)) => u == c,
            _ => false,
        },
        _ => false,
    }
}
