//! Generation orchestration.
//!
//! [`Gateway`] runs every generation request through the same skeleton:
//! refuse early when the client is unconfigured or the circuit is open,
//! validate and clamp parameters, load and truncate document context, build a
//! grounded prompt, call upstream, then extract and validate the output.
//! Each step that can fail maps to exactly one caller-facing error code.

use std::sync::Arc;

use groundwork_eval::{ExamPaper, McqItem, ScoredExam, SubmittedAnswer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{GenerationClient, HealthStatus};
use crate::config::{GatewayConfig, LimitsConfig};
use crate::document::DocumentStore;
use crate::error::{GatewayError, Result};
use crate::extract::{extract_json, is_usable, typed_items};
use crate::prompt::{self, Difficulty, NotesStyle};
use crate::request_state::{RequestKind, RequestPhase, RequestTrace};

/// Item count used when an MCQ request gives none (or nonsense).
pub const DEFAULT_MCQ_COUNT: u32 = 5;

/// Item count used when an exam request gives none (or nonsense).
pub const DEFAULT_EXAM_COUNT: u32 = 10;

/// Exam duration in minutes used when a request gives none (or nonsense).
pub const DEFAULT_EXAM_DURATION: u32 = 30;

/// Generated notes must be longer than this many characters.
pub const MIN_NOTES_CHARS: usize = 50;

/// Structured metadata extracted from a document's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// Main topics, as named in the text.
    #[serde(default)]
    pub topics: Vec<String>,

    /// Key concepts with their definitions.
    #[serde(default)]
    pub concepts: Vec<String>,

    /// A short summary.
    #[serde(default)]
    pub summary: String,
}

impl KnowledgeBase {
    /// Returns `true` if nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.concepts.is_empty() && self.summary.trim().is_empty()
    }
}

/// Clamps a requested count or duration into `1..=max`.
///
/// Missing, non-finite, zero, or negative values fall back to `default`.
/// Fractions round up.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_param(requested: Option<f64>, default: u32, max: u32) -> u32 {
    match requested {
        Some(n) if n.is_finite() && n > 0.0 => n.min(f64::from(max)).ceil() as u32,
        _ => default.min(max),
    }
}

/// Returns at most `max_chars` leading characters of `text`.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}

// ============================================================================
// Gateway
// ============================================================================

/// The grounded generation gateway.
#[derive(Clone)]
pub struct Gateway {
    client: GenerationClient,
    documents: Arc<dyn DocumentStore>,
    limits: LimitsConfig,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("client", &self.client)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a gateway from its collaborators.
    #[must_use]
    pub fn new(
        client: GenerationClient,
        documents: Arc<dyn DocumentStore>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            client,
            documents,
            limits,
        }
    }

    /// Creates a Groq-backed gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig, documents: Arc<dyn DocumentStore>) -> Result<Self> {
        Ok(Self::new(
            GenerationClient::from_config(config)?,
            documents,
            config.limits.clone(),
        ))
    }

    /// Returns the generation client.
    #[must_use]
    pub const fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Returns the active limits.
    #[must_use]
    pub const fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Reports upstream health without any I/O.
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        self.client.is_healthy()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Answers a question strictly from the document.
    ///
    /// When the answer is not in the document the model is instructed to
    /// reply with [`prompt::REFUSAL_PHRASE`].
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] whose [`code`](GatewayError::code) is one of
    /// the caller-facing codes.
    pub async fn ask_document(&self, document_id: &str, question: &str) -> Result<String> {
        let mut trace = RequestTrace::new(RequestKind::Ask, Some(document_id));
        let result = self.ask_inner(&mut trace, document_id, question).await;
        finish(&mut trace, result)
    }

    async fn ask_inner(
        &self,
        trace: &mut RequestTrace,
        document_id: &str,
        question: &str,
    ) -> Result<String> {
        self.preflight(trace)?;
        require_document_id(document_id)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(GatewayError::bad_request(
                "Document ID and a non-empty question are required",
            ));
        }

        let context = self
            .load_context(trace, document_id, self.limits.ask_context_chars)
            .await?;

        trace.advance(RequestPhase::Prompting);
        let prompt = prompt::tutor_prompt(&context, question);

        trace.advance(RequestPhase::AwaitingUpstream);
        self.client.generate_text(prompt).await
    }

    /// Generates a multiple-choice set from the document.
    ///
    /// `count` is clamped into `1..=maxItems` (default 5) and treated as an
    /// upper bound. Unrecognized difficulties become `medium`.
    ///
    /// # Errors
    ///
    /// Returns `GENERATION_FAILED` if the model output holds no usable items,
    /// besides the common caller-facing codes.
    pub async fn generate_mcqs(
        &self,
        document_id: &str,
        difficulty: &str,
        count: Option<f64>,
    ) -> Result<Vec<McqItem>> {
        let mut trace = RequestTrace::new(RequestKind::McqSet, Some(document_id));
        let result = self
            .mcqs_inner(&mut trace, document_id, difficulty, count)
            .await;
        finish(&mut trace, result)
    }

    async fn mcqs_inner(
        &self,
        trace: &mut RequestTrace,
        document_id: &str,
        difficulty: &str,
        count: Option<f64>,
    ) -> Result<Vec<McqItem>> {
        self.preflight(trace)?;
        require_document_id(document_id)?;
        let count = clamp_param(count, DEFAULT_MCQ_COUNT, self.limits.item_cap());
        let difficulty = Difficulty::from_str_lenient(difficulty);
        debug!(count, difficulty = %difficulty, "MCQ request parameters");

        let context = self
            .load_context(trace, document_id, self.limits.generation_context_chars)
            .await?;

        trace.advance(RequestPhase::Prompting);
        let prompt = prompt::mcq_prompt(&context, difficulty, count);

        trace.advance(RequestPhase::AwaitingUpstream);
        let text = self.client.generate_text(prompt).await?;

        let value = extract_json(&text)
            .filter(|v| v.is_array() && is_usable(v))
            .ok_or_else(|| GatewayError::generation_failed("no MCQ array in model output"))?;

        let mut items: Vec<McqItem> = typed_items(value);
        if items.is_empty() {
            return Err(GatewayError::generation_failed(
                "no well-formed MCQ items in model output",
            ));
        }
        items.truncate(count as usize);
        Ok(items)
    }

    /// Generates an exam paper from the document.
    ///
    /// `duration` is clamped into `1..=maxDurationMinutes` (default 30) and
    /// `count` into `1..=maxItems` (default 10).
    ///
    /// # Errors
    ///
    /// Returns `GENERATION_FAILED` if the model output is not a usable exam
    /// object, besides the common caller-facing codes.
    pub async fn generate_exam(
        &self,
        document_id: &str,
        duration: Option<f64>,
        count: Option<f64>,
        difficulty: &str,
    ) -> Result<ExamPaper> {
        let mut trace = RequestTrace::new(RequestKind::Exam, Some(document_id));
        let result = self
            .exam_inner(&mut trace, document_id, duration, count, difficulty)
            .await;
        finish(&mut trace, result)
    }

    async fn exam_inner(
        &self,
        trace: &mut RequestTrace,
        document_id: &str,
        duration: Option<f64>,
        count: Option<f64>,
        difficulty: &str,
    ) -> Result<ExamPaper> {
        self.preflight(trace)?;
        require_document_id(document_id)?;
        let duration = clamp_param(duration, DEFAULT_EXAM_DURATION, self.limits.duration_cap());
        let count = clamp_param(count, DEFAULT_EXAM_COUNT, self.limits.item_cap());
        let difficulty = Difficulty::from_str_lenient(difficulty);
        debug!(duration, count, difficulty = %difficulty, "Exam request parameters");

        let context = self
            .load_context(trace, document_id, self.limits.generation_context_chars)
            .await?;

        trace.advance(RequestPhase::Prompting);
        let prompt = prompt::exam_prompt(&context, duration, count, difficulty);

        trace.advance(RequestPhase::AwaitingUpstream);
        let text = self.client.generate_text(prompt).await?;

        let value = extract_json(&text)
            .filter(|v| v.is_object() && is_usable(v))
            .ok_or_else(|| GatewayError::generation_failed("no exam object in model output"))?;

        let mut paper: ExamPaper = serde_json::from_value(value).map_err(|e| {
            GatewayError::generation_failed(format!("exam object is malformed: {e}"))
        })?;
        if paper.questions.is_empty() {
            return Err(GatewayError::generation_failed("exam has no questions"));
        }
        if paper.duration == 0 {
            paper.duration = duration;
        }
        paper.questions.truncate(count as usize);
        Ok(paper)
    }

    /// Generates study notes from the document.
    ///
    /// Only `"short"` selects short notes; anything else produces a summary.
    ///
    /// # Errors
    ///
    /// Returns `GENERATION_FAILED` if the notes are no longer than
    /// [`MIN_NOTES_CHARS`], besides the common caller-facing codes.
    pub async fn generate_notes(&self, document_id: &str, style: &str) -> Result<String> {
        let mut trace = RequestTrace::new(RequestKind::Notes, Some(document_id));
        let result = self.notes_inner(&mut trace, document_id, style).await;
        finish(&mut trace, result)
    }

    async fn notes_inner(
        &self,
        trace: &mut RequestTrace,
        document_id: &str,
        style: &str,
    ) -> Result<String> {
        self.preflight(trace)?;
        require_document_id(document_id)?;
        let style = NotesStyle::from_str_lenient(style);

        let context = self
            .load_context(trace, document_id, self.limits.generation_context_chars)
            .await?;

        trace.advance(RequestPhase::Prompting);
        let prompt = prompt::notes_prompt(&context, style);

        trace.advance(RequestPhase::AwaitingUpstream);
        let text = self.client.generate_text(prompt).await?;

        if text.trim().chars().count() <= MIN_NOTES_CHARS {
            return Err(GatewayError::generation_failed("notes too brief"));
        }
        Ok(text)
    }

    /// Extracts topics, concepts, and a summary from raw text.
    ///
    /// An unconfigured gateway, or model output without a usable JSON object,
    /// yields an empty [`KnowledgeBase`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `SERVICE_UNAVAILABLE` while the circuit is open,
    /// `EMPTY_CONTEXT` for blank input, and upstream failure codes.
    pub async fn extract_knowledge_base(&self, text: &str) -> Result<KnowledgeBase> {
        let mut trace = RequestTrace::new(RequestKind::KnowledgeBase, None);
        let result = self.knowledge_base_inner(&mut trace, text).await;
        finish(&mut trace, result)
    }

    async fn knowledge_base_inner(
        &self,
        trace: &mut RequestTrace,
        text: &str,
    ) -> Result<KnowledgeBase> {
        trace.advance(RequestPhase::Validating);
        if !self.client.is_configured() {
            warn!("Upstream API key not configured, skipping knowledge-base extraction");
            skip_to_success(trace);
            return Ok(KnowledgeBase::default());
        }
        if let Some(retry_after_secs) = self.client.circuit().retry_after_secs() {
            return Err(GatewayError::CircuitOpen { retry_after_secs });
        }

        let sample = truncate_chars(text, self.limits.knowledge_base_chars);
        if sample.trim().is_empty() {
            return Err(GatewayError::empty_context("knowledge-base input"));
        }
        trace.advance(RequestPhase::ContextLoaded);
        debug!(chars = text.len(), sampled = sample.len(), "Knowledge-base extraction");

        trace.advance(RequestPhase::Prompting);
        let prompt = prompt::knowledge_base_prompt(sample);

        trace.advance(RequestPhase::AwaitingUpstream);
        let output = self.client.generate_text(prompt).await?;

        let parsed = extract_json(&output)
            .filter(|v| v.is_object() && is_usable(v))
            .and_then(|v| serde_json::from_value::<KnowledgeBase>(v).ok());

        match parsed {
            Some(kb) => {
                info!(
                    topics = kb.topics.len(),
                    concepts = kb.concepts.len(),
                    "Extracted knowledge base"
                );
                Ok(kb)
            }
            None => {
                warn!("No usable knowledge-base object in model output");
                Ok(KnowledgeBase::default())
            }
        }
    }

    /// Scores submitted answers against an exam and the document text.
    ///
    /// No upstream call is made.
    ///
    /// # Errors
    ///
    /// Returns `BAD_REQUEST` for a blank document id and `NOT_FOUND` for an
    /// unknown document.
    pub async fn score_exam(
        &self,
        document_id: &str,
        exam: &ExamPaper,
        answers: &[SubmittedAnswer],
    ) -> Result<ScoredExam> {
        require_document_id(document_id)?;
        let document = self
            .documents
            .get_document(document_id)
            .await
            .ok_or_else(|| GatewayError::document_not_found(document_id))?;

        let scored = groundwork_eval::score_exam(exam, answers, &document.extracted_text);
        info!(
            document_id = %document_id,
            score = scored.score,
            total_points = scored.total_points,
            answers = answers.len(),
            "Scored exam"
        );
        Ok(scored)
    }

    // ========================================================================
    // Shared steps
    // ========================================================================

    fn preflight(&self, trace: &mut RequestTrace) -> Result<()> {
        trace.advance(RequestPhase::Validating);
        match self.client.availability_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn load_context(
        &self,
        trace: &mut RequestTrace,
        document_id: &str,
        budget: usize,
    ) -> Result<String> {
        let document = self
            .documents
            .get_document(document_id)
            .await
            .ok_or_else(|| GatewayError::document_not_found(document_id))?;

        if !document.has_text() {
            return Err(GatewayError::empty_context(document_id));
        }

        let context = truncate_chars(&document.extracted_text, budget);
        if context.trim().is_empty() {
            return Err(GatewayError::empty_context(document_id));
        }

        trace.advance(RequestPhase::ContextLoaded);
        debug!(
            document_id = %document_id,
            chars = document.extracted_text.chars().count(),
            budget,
            truncated = context.len() < document.extracted_text.len(),
            "Loaded document context"
        );
        Ok(context.to_string())
    }
}

fn require_document_id(document_id: &str) -> Result<()> {
    if document_id.trim().is_empty() {
        return Err(GatewayError::bad_request("Document ID is required"));
    }
    Ok(())
}

/// Walks a trace that short-circuited with a result to `Succeeded`.
fn skip_to_success(trace: &mut RequestTrace) {
    for phase in [
        RequestPhase::ContextLoaded,
        RequestPhase::Prompting,
        RequestPhase::AwaitingUpstream,
    ] {
        trace.advance(phase);
    }
}

fn finish<T>(trace: &mut RequestTrace, result: Result<T>) -> Result<T> {
    let elapsed_ms = trace.elapsed().num_milliseconds();
    match &result {
        Ok(_) => {
            trace.advance(RequestPhase::Succeeded);
            info!(
                kind = %trace.kind,
                document_id = trace.document_id.as_deref().unwrap_or("-"),
                elapsed_ms,
                "Request succeeded"
            );
        }
        Err(err) => {
            trace.fail(err.code());
            warn!(
                kind = %trace.kind,
                document_id = trace.document_id.as_deref().unwrap_or("-"),
                code = %err.code(),
                error = %err,
                elapsed_ms,
                "Request failed"
            );
        }
    }
    result
}

/// Parses a loosely-typed numeric request parameter.
///
/// Accepts JSON numbers and numeric strings; anything else is `None`.
#[must_use]
pub fn numeric_param(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
