//! Groundwork Answer Evaluation
//!
//! This crate holds the exam data model shared by generation and scoring, and
//! the offline evaluation engine that scores submitted answers against the
//! source document without any model call.
//!
//! # Types
//!
//! - [`ExamPaper`] / [`ExamQuestion`] - A generated exam and its questions
//! - [`McqItem`] - One item of a generated multiple-choice set
//! - [`AnswerValue`] - An answer as submitted (option index or free text)
//! - [`EvaluationResult`] - Free-form scoring outcome for one answer
//! - [`ScoredExam`] - Aggregate result of scoring a submitted exam
//!
//! # Engines
//!
//! - [`compare_mcq_answers`] - Format-tolerant option-letter comparison
//! - [`evaluate_freeform_answer`] - Term-frequency cosine scoring
//! - [`score_exam`] - Per-question scoring and totals
//!
//! # Example
//!
//! ```rust
//! use groundwork_eval::{compare_mcq_answers, evaluate_freeform_answer, AnswerValue};
//!
//! let user = AnswerValue::from("C) Inertia");
//! let correct = AnswerValue::from(2);
//! assert!(compare_mcq_answers(Some(&user), Some(&correct)));
//!
//! let document = "An object in motion stays in motion. Forces change motion.";
//! let result = evaluate_freeform_answer("", document);
//! assert_eq!(result.score, 0);
//! ```

mod freeform;
mod mcq;
mod scoring;

pub use freeform::{
    cosine_similarity, evaluate_freeform_answer, split_sentences, tokenize, FeedbackTier,
    MAX_ANSWER_TOKENS, MAX_DOCUMENT_TOKENS, MAX_SUGGESTIONS,
};
pub use mcq::{compare_mcq_answers, option_letter, OPTION_LETTERS};
pub use scoring::{exam_feedback, score_exam, PASSING_FREEFORM_SCORE};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Answers and identifiers
// ============================================================================

/// An answer value as it appears in generated content or a submission.
///
/// Models and clients are inconsistent: the same option may arrive as the
/// index `2`, the letter `"C"`, or the full option text `"C) Inertia"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// A zero-based option index.
    Index(i64),
    /// Free text (a letter, an option label, or a written answer).
    Text(String),
}

impl AnswerValue {
    /// Returns `true` if the value carries no answer at all.
    ///
    /// Blank text counts as absent. An index never does, so `0` is a real
    /// answer (option A).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Index(_) => false,
            Self::Text(text) => text.trim().is_empty(),
        }
    }

    /// Returns the value as text for free-form evaluation.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Index(index) => index.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

impl From<i64> for AnswerValue {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl From<i32> for AnswerValue {
    fn from(index: i32) -> Self {
        Self::Index(i64::from(index))
    }
}

impl From<&str> for AnswerValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl std::fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Identifier of an exam question.
///
/// Generated exams use numbers, but clients round-tripping an exam through
/// JSON forms sometimes send them back as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    /// Numeric identifier.
    Number(i64),
    /// String identifier.
    Text(String),
}

impl QuestionId {
    /// Returns `true` if both identifiers name the same question.
    ///
    /// `1` and `"1"` are considered the same question.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }

    /// Returns the identifier in its canonical string form.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<i64> for QuestionId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<i32> for QuestionId {
    fn from(id: i32) -> Self {
        Self::Number(i64::from(id))
    }
}

impl From<&str> for QuestionId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

// ============================================================================
// Generated content
// ============================================================================

/// One multiple-choice item of a generated MCQ set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqItem {
    /// The question text.
    pub question: String,

    /// The answer options, normally four labelled `A)` through `D)`.
    #[serde(default)]
    pub options: Vec<String>,

    /// The correct option.
    pub answer: AnswerValue,

    /// Why the answer is correct, taken from the document.
    #[serde(default)]
    pub explanation: String,
}

/// Kind of an exam question.
///
/// Anything other than `mcq` is scored as free text, so unknown kinds decode
/// to [`QuestionKind::Short`]. A question without a kind is treated as `mcq`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuestionKind {
    /// Multiple choice, scored by option letter.
    #[default]
    Mcq,
    /// Short written answer, scored against the document.
    Short,
}

impl QuestionKind {
    /// Parses a kind case-insensitively.
    fn from_str_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("mcq") {
            Self::Mcq
        } else {
            Self::Short
        }
    }
}

impl<'de> Deserialize<'de> for QuestionKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_lenient(&s))
    }
}

impl Serialize for QuestionKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Mcq => "mcq",
            Self::Short => "short",
        };
        serializer.serialize_str(s)
    }
}

/// A single question of a generated exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    /// Identifier used to match submitted answers.
    pub id: QuestionId,

    /// Question kind (`mcq` or `short`).
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,

    /// The question text.
    #[serde(default)]
    pub question: String,

    /// Options for multiple-choice questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Correct option for multiple-choice questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerValue>,

    /// Expected answer for short questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key: Option<AnswerValue>,

    /// Points awarded for a fully correct answer.
    #[serde(
        default,
        deserialize_with = "lenient_points",
        skip_serializing_if = "Option::is_none"
    )]
    pub points: Option<u32>,
}

impl ExamQuestion {
    /// Returns the points this question is worth.
    ///
    /// Missing or zero points count as one.
    #[must_use]
    pub fn effective_points(&self) -> u32 {
        self.points.filter(|p| *p > 0).unwrap_or(1)
    }

    /// Decodes the question at 1-based `position` of a generated exam.
    ///
    /// A missing, null, or blank `id` becomes the position. Returns `None` if
    /// the entry is not an object or still fails to decode.
    #[must_use]
    pub fn from_value_at(mut value: Value, position: usize) -> Option<Self> {
        let fields = value.as_object_mut()?;
        let has_id = fields.get("id").is_some_and(|id| match id {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        });
        if !has_id {
            fields.insert("id".to_string(), Value::from(position));
        }
        serde_json::from_value(value).ok()
    }

    /// Returns the stored correct answer, preferring `answer` over `answerKey`.
    #[must_use]
    pub fn correct_answer(&self) -> Option<&AnswerValue> {
        self.answer
            .as_ref()
            .filter(|a| !a.is_blank())
            .or(self.answer_key.as_ref())
    }
}

/// A generated exam paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPaper {
    /// Exam title.
    #[serde(default)]
    pub title: String,

    /// Instructions shown to the candidate.
    #[serde(default)]
    pub instructions: String,

    /// Time allowed in minutes.
    #[serde(default, deserialize_with = "lenient_duration")]
    pub duration: u32,

    /// The questions, in presentation order.
    #[serde(default, deserialize_with = "lenient_questions")]
    pub questions: Vec<ExamQuestion>,
}

// ============================================================================
// Lenient decoding
// ============================================================================

/// Reads a non-negative whole number from a JSON number or a string that
/// starts with one (`"30 minutes"`). Fractions round to nearest.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_number(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(s.len());
            s[..end].parse::<f64>().ok()?
        }
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then(|| n.round().min(f64::from(u32::MAX)) as u32)
}

fn lenient_points<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(whole_number))
}

fn lenient_duration<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_points(deserializer)?.unwrap_or(0))
}

/// Keeps every question that decodes, dropping the rest.
fn lenient_questions<'de, D>(deserializer: D) -> std::result::Result<Vec<ExamQuestion>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| ExamQuestion::from_value_at(item, i + 1))
        .collect())
}

impl ExamPaper {
    /// Returns the sum of all question points.
    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(ExamQuestion::effective_points).sum()
    }

    /// Finds the question matching `id`.
    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&ExamQuestion> {
        self.questions.iter().find(|q| q.id.same_as(id))
    }
}

// ============================================================================
// Evaluation results
// ============================================================================

/// Outcome of scoring one free-form answer against the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Score from 0 to 100.
    pub score: u8,

    /// Raw cosine similarity between answer and document, 0 to 1.
    pub similarity: f64,

    /// Short human-readable feedback.
    pub feedback: String,

    /// Up to three document sentences the answer should have drawn on.
    pub suggestions: Vec<String>,
}

/// An answer submitted by the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    /// Question this answer belongs to.
    pub question_id: QuestionId,

    /// The answer given, if any.
    #[serde(default)]
    pub user_answer: Option<AnswerValue>,
}

impl SubmittedAnswer {
    /// Creates a new submitted answer.
    #[must_use]
    pub fn new(question_id: impl Into<QuestionId>, user_answer: impl Into<AnswerValue>) -> Self {
        Self {
            question_id: question_id.into(),
            user_answer: Some(user_answer.into()),
        }
    }
}

/// A submitted answer after scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredAnswer {
    /// Question this answer belongs to.
    pub question_id: QuestionId,

    /// The answer given, if any.
    pub user_answer: Option<AnswerValue>,

    /// Whether the answer counts as correct.
    pub is_correct: bool,

    /// Points awarded for this answer.
    pub awarded_points: u32,

    /// Free-form evaluation detail, present for non-MCQ questions.
    #[serde(rename = "eval", default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationResult>,
}

/// Aggregate result of scoring a submitted exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredExam {
    /// Every submitted answer with its outcome, in submission order.
    pub scored_answers: Vec<ScoredAnswer>,

    /// Sum of awarded points.
    pub score: u32,

    /// Sum of points over every question of the exam.
    pub total_points: u32,

    /// Overall feedback line.
    pub feedback: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_value_deserializes_index_and_text() {
        let index: AnswerValue = serde_json::from_str("2").unwrap();
        assert_eq!(index, AnswerValue::Index(2));

        let text: AnswerValue = serde_json::from_str(r#""C) Inertia""#).unwrap();
        assert_eq!(text, AnswerValue::Text("C) Inertia".to_string()));
    }

    #[test]
    fn test_answer_value_blankness() {
        assert!(AnswerValue::from("   ").is_blank());
        assert!(!AnswerValue::from(0).is_blank());
        assert!(!AnswerValue::from("A").is_blank());
    }

    #[test]
    fn test_question_id_matches_across_representations() {
        assert!(QuestionId::from(3).same_as(&QuestionId::from("3")));
        assert!(!QuestionId::from(3).same_as(&QuestionId::from(4)));
    }

    #[test]
    fn test_question_kind_is_lenient() {
        let q: ExamQuestion =
            serde_json::from_str(r#"{"id": 1, "type": "MCQ", "question": "Q"}"#).unwrap();
        assert_eq!(q.kind, QuestionKind::Mcq);

        let q: ExamQuestion =
            serde_json::from_str(r#"{"id": 2, "type": "essay", "question": "Q"}"#).unwrap();
        assert_eq!(q.kind, QuestionKind::Short);

        let q: ExamQuestion = serde_json::from_str(r#"{"id": 3, "question": "Q"}"#).unwrap();
        assert_eq!(q.kind, QuestionKind::Mcq);
    }

    #[test]
    fn test_exam_paper_deserialization() {
        let json = r#"{
            "title": "Document Proficiency Exam",
            "instructions": "Answer using only the document.",
            "duration": 30,
            "questions": [
                {"id": 1, "type": "mcq", "question": "Q1",
                 "options": ["A) x", "B) y", "C) z", "D) w"], "answer": "A", "points": 2},
                {"id": 2, "type": "short", "question": "Q2",
                 "answerKey": "Because", "points": 5}
            ]
        }"#;

        let exam: ExamPaper = serde_json::from_str(json).unwrap();
        assert_eq!(exam.duration, 30);
        assert_eq!(exam.questions.len(), 2);
        assert_eq!(exam.questions[1].kind, QuestionKind::Short);
        assert_eq!(
            exam.questions[1].answer_key,
            Some(AnswerValue::from("Because"))
        );
        assert_eq!(exam.total_points(), 7);
    }

    #[test]
    fn test_exam_paper_tolerates_loose_model_fields() {
        let json = r#"{
            "title": "Loose",
            "duration": "30 minutes",
            "questions": [
                {"type": "mcq", "question": "No id", "answer": "A", "points": 2.5},
                {"id": null, "type": "short", "question": "Null id", "points": "4"},
                "not a question",
                {"id": 7, "question": "Fine", "points": 1}
            ]
        }"#;

        let exam: ExamPaper = serde_json::from_str(json).unwrap();
        assert_eq!(exam.duration, 30);
        assert_eq!(exam.questions.len(), 3);
        assert_eq!(exam.questions[0].id, QuestionId::from(1));
        assert_eq!(exam.questions[0].points, Some(3));
        assert_eq!(exam.questions[1].id, QuestionId::from(2));
        assert_eq!(exam.questions[1].points, Some(4));
        assert_eq!(exam.questions[2].id, QuestionId::from(7));
        assert_eq!(exam.total_points(), 8);
    }

    #[test]
    fn test_unreadable_numbers_fall_back() {
        let exam: ExamPaper =
            serde_json::from_str(r#"{"duration": "soon", "questions": {"id": 1}}"#).unwrap();
        assert_eq!(exam.duration, 0);
        assert!(exam.questions.is_empty());

        let q: ExamQuestion =
            serde_json::from_str(r#"{"id": 1, "points": -2}"#).unwrap();
        assert_eq!(q.points, None);
        assert_eq!(q.effective_points(), 1);
    }

    #[test]
    fn test_effective_points_defaults_to_one() {
        let q: ExamQuestion = serde_json::from_str(r#"{"id": 1, "points": 0}"#).unwrap();
        assert_eq!(q.effective_points(), 1);

        let q: ExamQuestion = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(q.effective_points(), 1);
    }

    #[test]
    fn test_correct_answer_falls_back_to_answer_key() {
        let q: ExamQuestion =
            serde_json::from_str(r#"{"id": 1, "answer": "", "answerKey": "B"}"#).unwrap();
        assert_eq!(q.correct_answer(), Some(&AnswerValue::from("B")));
    }

    #[test]
    fn test_scored_answer_serialization_uses_eval_key() {
        let scored = ScoredAnswer {
            question_id: QuestionId::from(1),
            user_answer: Some(AnswerValue::from("A")),
            is_correct: true,
            awarded_points: 2,
            evaluation: None,
        };

        let json = serde_json::to_string(&scored).unwrap();
        assert!(json.contains(r#""questionId":1"#));
        assert!(json.contains(r#""isCorrect":true"#));
        assert!(json.contains(r#""awardedPoints":2"#));
        assert!(!json.contains("eval"));
    }
}
