//! Grounded prompt construction.
//!
//! Every builder is a pure function of the document context and request
//! parameters. The context is embedded verbatim; truncation to a context
//! budget happens in the orchestrator before a builder is called.

use serde::{Deserialize, Serialize};

/// Exact reply the model must give when the answer is not in the document.
pub const REFUSAL_PHRASE: &str = "Not found in the document.";

/// Exact reply the model must give when the document has no content.
pub const EMPTY_DOCUMENT_PHRASE: &str = "Insufficient content in the provided document.";

// ============================================================================
// Prompt shape
// ============================================================================

/// A single chat message sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Input to a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// A single user message.
    PlainText(String),
    /// A system/user pair, or an explicit message list.
    ///
    /// When `messages` is present it replaces `system` and `user` entirely.
    Structured {
        /// Optional system message.
        system: Option<String>,
        /// Optional user message.
        user: Option<String>,
        /// Explicit message list.
        messages: Option<Vec<ChatMessage>>,
    },
}

impl Prompt {
    /// Creates a structured prompt from a system and a user message.
    #[must_use]
    pub fn system_user(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self::Structured {
            system: Some(system.into()),
            user: Some(user.into()),
            messages: None,
        }
    }

    /// Resolves the prompt into the message list sent upstream.
    #[must_use]
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            Self::PlainText(text) => vec![ChatMessage::user(text)],
            Self::Structured {
                messages: Some(messages),
                ..
            } => messages,
            Self::Structured { system, user, .. } => system
                .map(ChatMessage::system)
                .into_iter()
                .chain(user.map(ChatMessage::user))
                .collect(),
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Question difficulty for generated MCQs and exams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Recall of stated facts.
    Easy,
    /// The default.
    #[default]
    Medium,
    /// Requires combining several parts of the document.
    Hard,
}

impl Difficulty {
    /// Parses a difficulty case-insensitively. Anything unrecognized is `Medium`.
    #[must_use]
    pub fn from_str_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// Style of generated study notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotesStyle {
    /// A comprehensive overview.
    #[default]
    Summary,
    /// Essential points only.
    Short,
}

impl NotesStyle {
    /// Parses a style. Only `short` selects [`NotesStyle::Short`].
    #[must_use]
    pub fn from_str_lenient(s: &str) -> Self {
        if s == "short" {
            Self::Short
        } else {
            Self::Summary
        }
    }
}

impl std::fmt::Display for NotesStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::Short => write!(f, "short"),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

const MCQ_SYSTEM: &str = "You are an MCQ generator. Generate questions only from the document content provided.
Mandatory rules:
1. Every question and option must come from the document.
2. Never invent questions or facts, and never use external knowledge.
3. If there is insufficient content, generate fewer questions.
4. Output only a valid JSON array. No markdown.";

const EXAM_SYSTEM: &str = "You are an exam generator. Create exams only from the document content provided.
Mandatory rules:
1. All questions and answers must come from the document.
2. Never hallucinate, assume, or use external knowledge.
3. If there is insufficient content, generate fewer questions.
4. Output only valid JSON. No markdown.";

const NOTES_SYSTEM: &str = "You are a note generator. Create notes only from the document content provided.
Mandatory rules:
1. All content must come from the document.
2. Never use external knowledge or invent facts.
3. Use clear headings and bullet points.
4. Simple, student-friendly language only.
5. No emojis, marketing language, or self-references.";

/// Builds the tutor prompt: grounding rules and context as the system
/// message, the question as the user message.
#[must_use]
pub fn tutor_prompt(context: &str, question: &str) -> Prompt {
    let system = format!(
        "You are a document-based educational assistant. Answer only using content from the provided document.

Mandatory rules (never violate):
1. Only use text explicitly in the document.
2. Never use external knowledge or assumptions.
3. Never invent facts or details.
4. If the answer is not in the document, respond exactly: \"{REFUSAL_PHRASE}\"
5. If the document is empty, respond exactly: \"{EMPTY_DOCUMENT_PHRASE}\"
6. Quote directly from the document when possible.

DOCUMENT CONTENT:
{context}
"
    );
    Prompt::system_user(system, question)
}

/// Builds the MCQ-set prompt. `count` is an upper bound, not a quota.
#[must_use]
pub fn mcq_prompt(context: &str, difficulty: Difficulty, count: u32) -> Prompt {
    let user = format!(
        r#"Create multiple-choice questions only from the provided document.

Mandatory rules (never violate):
1. Every question must come from the document content.
2. Every option must be sourced from the document.
3. Never invent questions, options, or facts.
4. Never use external knowledge.
5. If there is insufficient content for {count} questions, generate fewer. Do not pad.
6. Output only a valid JSON array. No markdown or code blocks.

JSON FORMAT (only):
[
  {{
    "question": "Question from the document",
    "options": ["A) From the document", "B) From the document", "C) From the document", "D) From the document"],
    "answer": "A",
    "explanation": "Explanation from the document"
  }}
]

DIFFICULTY: {difficulty}
TARGET COUNT: {count}

DOCUMENT CONTENT:
{context}
"#
    );
    Prompt::system_user(MCQ_SYSTEM, user)
}

/// Builds the exam prompt. `count` is an upper bound, not a quota.
#[must_use]
pub fn exam_prompt(context: &str, duration: u32, count: u32, difficulty: Difficulty) -> Prompt {
    let user = format!(
        r#"Create a professional exam only from the provided document content.

Mandatory rules (never violate):
1. All questions and answers must come from the document.
2. Never hallucinate, assume, or use external knowledge.
3. Never invent facts not in the document.
4. Question mix:
   - Multiple-choice ("mcq"): 4 options, one correct answer
   - Short-answer ("short"): answerable using only the document, clearly scorable
5. If there is insufficient content for {count} questions, generate fewer. Do not pad.
6. Output only valid JSON. No markdown.

EXAM PARAMETERS:
- Duration: {duration} minutes
- Target questions: {count}
- Difficulty: {difficulty}

JSON FORMAT:
{{
  "title": "Document Proficiency Exam",
  "instructions": "Answer using only information from the provided document.",
  "duration": {duration},
  "questions": [
    {{
      "id": 1,
      "type": "mcq",
      "question": "Question from the document",
      "options": ["A) From the document", "B) From the document", "C) From the document", "D) From the document"],
      "answer": "A",
      "points": 2
    }},
    {{
      "id": 2,
      "type": "short",
      "question": "Short-answer question from the document",
      "answerKey": "Expected answer sourced from the document",
      "points": 5
    }}
  ]
}}

DOCUMENT CONTENT:
{context}
"#
    );
    Prompt::system_user(EXAM_SYSTEM, user)
}

/// Builds the study-notes prompt.
#[must_use]
pub fn notes_prompt(context: &str, style: NotesStyle) -> Prompt {
    let length_rule = match style {
        NotesStyle::Short => "6. Keep it extremely concise (essential points only, 1-2 minute read).",
        NotesStyle::Summary => {
            "6. Give a comprehensive overview including key concepts and main points."
        }
    };
    let user = format!(
        "Create {style} study notes only from the provided document.

Mandatory rules (never violate):
1. All content must come from the document.
2. Never use external knowledge or invent facts.
3. Never include details not in the document.
4. Format using clear headings and bullet points.
5. Simple, student-friendly language.
{length_rule}
7. No emojis, marketing language, or self-references.

OUTPUT NOTES FROM THIS DOCUMENT ONLY:
{context}
"
    );
    Prompt::system_user(NOTES_SYSTEM, user)
}

/// Builds the knowledge-base extraction prompt.
#[must_use]
pub fn knowledge_base_prompt(text: &str) -> Prompt {
    Prompt::PlainText(format!(
        r#"Analyze the provided text and extract its core structure. Use only information in the text.

RULES:
1. List main topics directly from the text.
2. List key concepts and definitions as they appear in the text.
3. Summarize using only text content (3-5 sentences).
4. Do not add external knowledge or assumptions.

OUTPUT FORMAT (valid JSON):
{{
  "topics": ["Topic 1 from text", "Topic 2 from text"],
  "concepts": ["Concept 1: definition", "Concept 2: definition"],
  "summary": "3-5 sentence summary using only text content"
}}

TEXT TO ANALYZE:
{text}
"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT: &str =
        "Newton's First Law: an object in motion stays in motion unless acted upon.";

    fn system_and_user(prompt: Prompt) -> (String, String) {
        let messages = prompt.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        (messages[0].content.clone(), messages[1].content.clone())
    }

    #[test]
    fn test_plain_text_is_single_user_message() {
        let messages = Prompt::PlainText("hello".to_string()).into_messages();
        assert_eq!(messages, vec![ChatMessage::user("hello")]);
    }

    #[test]
    fn test_structured_messages_replace_system_and_user() {
        let prompt = Prompt::Structured {
            system: Some("ignored".to_string()),
            user: Some("ignored".to_string()),
            messages: Some(vec![ChatMessage::user("only this")]),
        };
        assert_eq!(prompt.into_messages(), vec![ChatMessage::user("only this")]);
    }

    #[test]
    fn test_structured_without_system() {
        let prompt = Prompt::Structured {
            system: None,
            user: Some("question".to_string()),
            messages: None,
        };
        assert_eq!(prompt.into_messages(), vec![ChatMessage::user("question")]);
    }

    #[test]
    fn test_tutor_prompt_embeds_context_and_refusal() {
        let (system, user) = system_and_user(tutor_prompt(CONTEXT, "What is Newton's First Law?"));

        assert!(system.contains(CONTEXT));
        assert!(system.contains(REFUSAL_PHRASE));
        assert!(system.contains("Never use external knowledge"));
        assert_eq!(user, "What is Newton's First Law?");
    }

    #[test]
    fn test_context_is_not_truncated() {
        let long_context = "word ".repeat(50_000);
        let (system, _) = system_and_user(tutor_prompt(&long_context, "q"));
        assert!(system.contains(&long_context));
    }

    #[test]
    fn test_mcq_prompt_parameters() {
        let (system, user) = system_and_user(mcq_prompt(CONTEXT, Difficulty::Hard, 7));

        assert!(system.contains("JSON array"));
        assert!(user.contains("DIFFICULTY: hard"));
        assert!(user.contains("TARGET COUNT: 7"));
        assert!(user.contains("generate fewer"));
        assert!(user.contains(r#""answer": "A""#));
        assert!(user.contains(CONTEXT));
    }

    #[test]
    fn test_exam_prompt_parameters() {
        let (_, user) = system_and_user(exam_prompt(CONTEXT, 45, 12, Difficulty::Easy));

        assert!(user.contains("Duration: 45 minutes"));
        assert!(user.contains(r#""duration": 45"#));
        assert!(user.contains("Target questions: 12"));
        assert!(user.contains(r#""type": "mcq""#));
        assert!(user.contains(r#""type": "short""#));
        assert!(user.contains(CONTEXT));
    }

    #[test]
    fn test_notes_prompt_styles() {
        let (_, short) = system_and_user(notes_prompt(CONTEXT, NotesStyle::Short));
        assert!(short.contains("Create short study notes"));
        assert!(short.contains("extremely concise"));

        let (_, summary) = system_and_user(notes_prompt(CONTEXT, NotesStyle::Summary));
        assert!(summary.contains("Create summary study notes"));
        assert!(summary.contains("comprehensive overview"));
    }

    #[test]
    fn test_knowledge_base_prompt_shape() {
        let messages = knowledge_base_prompt(CONTEXT).into_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains(r#""topics""#));
        assert!(messages[0].content.contains(r#""concepts""#));
        assert!(messages[0].content.contains(CONTEXT));
    }

    #[test]
    fn test_difficulty_normalization() {
        assert_eq!(Difficulty::from_str_lenient(" HARD "), Difficulty::Hard);
        assert_eq!(Difficulty::from_str_lenient("Easy"), Difficulty::Easy);
        assert_eq!(Difficulty::from_str_lenient("extreme"), Difficulty::Medium);
        assert_eq!(Difficulty::from_str_lenient(""), Difficulty::Medium);
    }

    #[test]
    fn test_notes_style_only_short_is_short() {
        assert_eq!(NotesStyle::from_str_lenient("short"), NotesStyle::Short);
        assert_eq!(NotesStyle::from_str_lenient("SHORT"), NotesStyle::Summary);
        assert_eq!(NotesStyle::from_str_lenient("detailed"), NotesStyle::Summary);
    }
}
