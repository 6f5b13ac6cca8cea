//! Aggregate exam scoring.

use std::collections::HashSet;

use crate::{
    compare_mcq_answers, evaluate_freeform_answer, ExamPaper, ExamQuestion, QuestionKind,
    ScoredAnswer, ScoredExam, SubmittedAnswer,
};

/// Minimum free-form score for an answer to count as correct.
pub const PASSING_FREEFORM_SCORE: u8 = 60;

/// Fraction of total points at which the overall feedback turns positive.
const GREAT_WORK_RATIO: f64 = 0.7;

/// Scores submitted answers against an exam and its source document.
///
/// Each answer is matched to a question by id. Multiple-choice questions award
/// full points on a letter match. Every other kind is scored with
/// [`evaluate_freeform_answer`] against `document_text` and awards
/// `round(points * score / 100)`.
///
/// `total_points` is the sum over every question of the exam, whether or not
/// it was answered. Answers that match no question are listed with zero
/// points, and only the first answer submitted for a question is scored.
#[must_use]
pub fn score_exam(
    exam: &ExamPaper,
    answers: &[SubmittedAnswer],
    document_text: &str,
) -> ScoredExam {
    let mut seen = HashSet::new();
    let mut scored_answers = Vec::with_capacity(answers.len());

    for submitted in answers {
        let question = exam
            .question(&submitted.question_id)
            .filter(|q| seen.insert(q.id.canonical()));

        let scored = match question {
            Some(question) => score_answer(question, submitted, document_text),
            None => ScoredAnswer {
                question_id: submitted.question_id.clone(),
                user_answer: submitted.user_answer.clone(),
                is_correct: false,
                awarded_points: 0,
                evaluation: None,
            },
        };
        scored_answers.push(scored);
    }

    let score = scored_answers.iter().map(|a| a.awarded_points).sum();
    let total_points = exam.total_points();

    ScoredExam {
        scored_answers,
        score,
        total_points,
        feedback: exam_feedback(score, total_points),
    }
}

fn score_answer(
    question: &ExamQuestion,
    submitted: &SubmittedAnswer,
    document_text: &str,
) -> ScoredAnswer {
    let points = question.effective_points();

    let (is_correct, awarded_points, evaluation) = match question.kind {
        QuestionKind::Mcq => {
            let is_correct =
                compare_mcq_answers(submitted.user_answer.as_ref(), question.correct_answer());
            (is_correct, if is_correct { points } else { 0 }, None)
        }
        QuestionKind::Short => {
            let answer_text = submitted
                .user_answer
                .as_ref()
                .map(crate::AnswerValue::as_text)
                .unwrap_or_default();
            let result = evaluate_freeform_answer(&answer_text, document_text);
            let awarded = proportional_points(points, result.score);
            (result.score >= PASSING_FREEFORM_SCORE, awarded, Some(result))
        }
    };

    ScoredAnswer {
        question_id: submitted.question_id.clone(),
        user_answer: submitted.user_answer.clone(),
        is_correct,
        awarded_points,
        evaluation,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn proportional_points(points: u32, score: u8) -> u32 {
    (f64::from(points) * f64::from(score) / 100.0).round() as u32
}

/// Builds the overall feedback line for a scored exam.
#[must_use]
pub fn exam_feedback(score: u32, total_points: u32) -> String {
    let great = total_points > 0 && f64::from(score) / f64::from(total_points) >= GREAT_WORK_RATIO;
    let verdict = if great {
        "Great work!"
    } else {
        "Keep studying the document for better results."
    };
    format!("You scored {score} out of {total_points}. {verdict}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{AnswerValue, QuestionId};

    const DOCUMENT: &str = "Newton's First Law: an object in motion stays in motion \
                            unless acted upon. Inertia is the tendency to resist change.";

    fn exam() -> ExamPaper {
        serde_json::from_str(
            r#"{
                "title": "Physics",
                "instructions": "Use the document.",
                "duration": 30,
                "questions": [
                    {"id": 1, "type": "mcq", "question": "Which law?",
                     "options": ["A) First", "B) Second", "C) Third", "D) None"],
                     "answer": "A", "points": 2},
                    {"id": 2, "type": "mcq", "question": "Resistance to change?",
                     "options": ["A) Force", "B) Mass", "C) Inertia", "D) Speed"],
                     "answer": 2, "points": 2},
                    {"id": 3, "type": "short", "question": "State the First Law.",
                     "answerKey": "An object in motion stays in motion.", "points": 4}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_perfect_mcq_and_empty_short_answer() {
        let answers = vec![
            SubmittedAnswer::new(1, "A) First"),
            SubmittedAnswer::new(2, "c"),
            SubmittedAnswer::new(3, ""),
        ];

        let result = score_exam(&exam(), &answers, DOCUMENT);

        assert_eq!(result.total_points, 8);
        assert_eq!(result.score, 4);
        assert!(result.scored_answers[0].is_correct);
        assert!(result.scored_answers[1].is_correct);
        assert!(!result.scored_answers[2].is_correct);
        assert_eq!(result.scored_answers[2].awarded_points, 0);
        assert!(result.scored_answers[2].evaluation.is_some());
        insta::assert_snapshot!(result.feedback, @"You scored 4 out of 8. Keep studying the document for better results.");
    }

    #[test]
    fn test_short_answer_identical_to_document_gets_full_points() {
        let answers = vec![
            SubmittedAnswer::new(1, "A"),
            SubmittedAnswer::new(2, 2),
            SubmittedAnswer::new(3, DOCUMENT),
        ];

        let result = score_exam(&exam(), &answers, DOCUMENT);

        assert_eq!(result.score, 8);
        assert!(result.scored_answers[2].is_correct);
        assert_eq!(result.scored_answers[2].evaluation.as_ref().unwrap().score, 100);
        insta::assert_snapshot!(result.feedback, @"You scored 8 out of 8. Great work!");
    }

    #[test]
    fn test_total_points_counts_unanswered_questions() {
        let answers = vec![SubmittedAnswer::new(1, "A")];

        let result = score_exam(&exam(), &answers, DOCUMENT);

        assert_eq!(result.scored_answers.len(), 1);
        assert_eq!(result.score, 2);
        assert_eq!(result.total_points, 8);
    }

    #[test]
    fn test_unmatched_answer_is_listed_with_zero_points() {
        let answers = vec![SubmittedAnswer::new(99, "A")];

        let result = score_exam(&exam(), &answers, DOCUMENT);

        assert_eq!(result.scored_answers.len(), 1);
        assert!(!result.scored_answers[0].is_correct);
        assert_eq!(result.scored_answers[0].awarded_points, 0);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_string_question_ids_match_numeric_ids() {
        let answers = vec![SubmittedAnswer {
            question_id: QuestionId::from("1"),
            user_answer: Some(AnswerValue::from("A")),
        }];

        let result = score_exam(&exam(), &answers, DOCUMENT);

        assert!(result.scored_answers[0].is_correct);
        assert_eq!(result.score, 2);
    }

    #[test]
    fn test_duplicate_answers_score_once() {
        let answers = vec![SubmittedAnswer::new(1, "A"), SubmittedAnswer::new(1, "A")];

        let result = score_exam(&exam(), &answers, DOCUMENT);

        assert_eq!(result.scored_answers.len(), 2);
        assert_eq!(result.scored_answers[1].awarded_points, 0);
        assert_eq!(result.score, 2);
    }

    #[test]
    fn test_missing_user_answer_is_wrong_for_mcq() {
        let answers = vec![SubmittedAnswer {
            question_id: QuestionId::from(1),
            user_answer: None,
        }];

        let result = score_exam(&exam(), &answers, DOCUMENT);

        assert!(!result.scored_answers[0].is_correct);
    }

    #[test]
    fn test_feedback_threshold() {
        assert!(exam_feedback(7, 10).ends_with("Great work!"));
        assert!(exam_feedback(6, 10).ends_with("better results."));
        assert!(exam_feedback(0, 0).ends_with("better results."));
    }
}
