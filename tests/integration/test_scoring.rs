//! Offline scoring tests against the fixture exam and document.

use std::path::PathBuf;

use groundwork_eval::{
    compare_mcq_answers, evaluate_freeform_answer, exam_feedback, score_exam, AnswerValue,
    ExamPaper, SubmittedAnswer,
};
use groundwork_gateway::Document;

/// Path to the fixture directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn load_fixtures() -> (ExamPaper, Vec<SubmittedAnswer>, Document) {
    let exam = std::fs::read_to_string(fixture_path().join("exam.json")).expect("exam fixture");
    let answers =
        std::fs::read_to_string(fixture_path().join("answers.json")).expect("answers fixture");
    let document = Document::load_file(&fixture_path().join("documents/newton.txt"))
        .expect("Failed to load newton.txt");

    (
        serde_json::from_str(&exam).expect("exam JSON"),
        serde_json::from_str(&answers).expect("answers JSON"),
        document,
    )
}

/// Tests that the fixture exam parses with defaults applied.
#[test]
fn test_fixture_exam_loads() {
    let (exam, answers, document) = load_fixtures();

    assert_eq!(exam.title, "Laws of Motion Exam");
    assert_eq!(exam.questions.len(), 4);
    assert_eq!(exam.questions[3].effective_points(), 1);
    assert_eq!(exam.total_points(), 10);
    assert_eq!(answers.len(), 6);
    assert_eq!(document.id, "newton");
}

/// Tests the full scoring of the fixture submission.
#[test]
fn test_fixture_submission_scores() {
    let (exam, answers, document) = load_fixtures();

    let scored = score_exam(&exam, &answers, &document.extracted_text);

    assert_eq!(scored.total_points, 10);
    assert_eq!(scored.scored_answers.len(), answers.len());

    // Multiple choice: letter with punctuation, and a letter against an index.
    assert!(scored.scored_answers[0].is_correct);
    assert_eq!(scored.scored_answers[0].awarded_points, 2);
    assert!(scored.scored_answers[1].is_correct);
    assert_eq!(scored.scored_answers[1].awarded_points, 2);

    // Free-form answer quoting the document is scored by similarity.
    let short = &scored.scored_answers[2];
    let eval = short.evaluation.as_ref().expect("free-form evaluation");
    let expected = evaluate_freeform_answer(
        answers[2].user_answer.as_ref().map(AnswerValue::as_text).as_deref().unwrap_or(""),
        &document.extracted_text,
    );
    assert_eq!(eval, &expected);
    assert!(eval.score > 0);
    assert_eq!(short.is_correct, eval.score >= 60);

    // Empty free-form answer earns nothing.
    assert_eq!(scored.scored_answers[3].awarded_points, 0);
    assert!(!scored.scored_answers[3].is_correct);

    // Duplicate and unknown questions earn nothing.
    assert_eq!(scored.scored_answers[4].awarded_points, 0);
    assert_eq!(scored.scored_answers[5].awarded_points, 0);

    let awarded: u32 = scored.scored_answers.iter().map(|a| a.awarded_points).sum();
    assert_eq!(scored.score, awarded);
    assert_eq!(scored.feedback, exam_feedback(scored.score, 10));
}

/// Tests that copying a document sentence ranks that sentence first.
#[test]
fn test_suggestions_point_back_into_document() {
    let (_, _, document) = load_fixtures();

    let result = evaluate_freeform_answer(
        "Newton's Third Law states that for every action there is an equal and opposite reaction.",
        &document.extracted_text,
    );

    assert!(!result.suggestions.is_empty());
    assert!(result.suggestions[0].contains("equal and opposite reaction"));
}

/// Tests that scoring the whole document against itself is a perfect score.
#[test]
fn test_document_against_itself() {
    let (_, _, document) = load_fixtures();
    let result = evaluate_freeform_answer(&document.extracted_text, &document.extracted_text);
    assert_eq!(result.score, 100);
}

/// Tests MCQ comparison on the answer shapes clients actually send.
#[test]
fn test_mcq_comparison_shapes() {
    let cases = [
        (AnswerValue::from("C) The answer"), AnswerValue::from("c"), true),
        (AnswerValue::from(2), AnswerValue::from("C"), true),
        (AnswerValue::from("Z"), AnswerValue::from("A"), false),
        (AnswerValue::from("  (b) inertia"), AnswerValue::from(1), true),
    ];

    for (user, correct, expected) in cases {
        assert_eq!(
            compare_mcq_answers(Some(&user), Some(&correct)),
            expected,
            "{user} vs {correct}"
        );
        assert_eq!(compare_mcq_answers(Some(&correct), Some(&user)), expected);
    }

    assert!(compare_mcq_answers(None, None));
    assert!(!compare_mcq_answers(None, Some(&AnswerValue::from("A"))));
}
