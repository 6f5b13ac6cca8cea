//! HTTP API for the grounded generation gateway.
//!
//! # Endpoints
//!
//! - `GET /api/ai/health` - Upstream availability (200 or 503)
//! - `POST /api/ai/ask` - Answer a question from a document
//! - `POST /api/ai/generate-mcqs` - Generate a multiple-choice set
//! - `POST /api/ai/generate-exam` - Generate an exam paper
//! - `POST /api/ai/generate-notes` - Generate study notes
//! - `POST /api/ai/knowledge-base` - Extract topics, concepts, and a summary
//! - `POST /api/results/score` - Score submitted exam answers
//!
//! Every failure responds with `{"error": CODE, "message": text}`. Responses
//! caused by an open circuit carry a `Retry-After` header.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use groundwork_gateway::{create_router, AppState, Gateway, GatewayConfig, MemoryDocumentStore};
//!
//! # async fn example() -> groundwork_gateway::Result<()> {
//! let config = GatewayConfig::default();
//! let store = Arc::new(MemoryDocumentStore::new());
//! let gateway = Gateway::from_config(&config, store)?;
//!
//! let router = create_router(AppState::new(gateway));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use groundwork_eval::{ExamPaper, McqItem, ScoredExam, SubmittedAnswer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::client::HealthStatus;
use crate::error::{ErrorCode, GatewayError};
use crate::orchestrator::{numeric_param, Gateway, KnowledgeBase};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/ai/ask`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// Document to answer from.
    #[serde(default, alias = "pdfId")]
    pub document_id: String,
    /// The question.
    #[serde(default)]
    pub question: String,
}

/// Response body for `POST /api/ai/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// The grounded answer, or the fixed refusal phrase.
    pub answer: String,
}

/// Request body for `POST /api/ai/generate-mcqs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqRequest {
    /// Document to generate from.
    #[serde(default, alias = "pdfId")]
    pub document_id: String,
    /// `easy`, `medium`, or `hard`; missing or null means `medium`.
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Upper bound on the number of items; a number or numeric string.
    #[serde(default)]
    pub count: Option<Value>,
}

/// Request body for `POST /api/ai/generate-exam`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRequest {
    /// Document to generate from.
    #[serde(default, alias = "pdfId")]
    pub document_id: String,
    /// Time allowed in minutes; a number or numeric string.
    #[serde(default)]
    pub duration: Option<Value>,
    /// Upper bound on the number of questions; a number or numeric string.
    #[serde(default)]
    pub count: Option<Value>,
    /// `easy`, `medium`, or `hard`; missing or null means `medium`.
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// Request body for `POST /api/ai/generate-notes`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesRequest {
    /// Document to generate from.
    #[serde(default, alias = "pdfId")]
    pub document_id: String,
    /// `summary` (default) or `short`; null means `summary`.
    #[serde(default, alias = "type")]
    pub style: Option<String>,
}

/// Response body for `POST /api/ai/generate-notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesResponse {
    /// Markdown study notes.
    pub notes: String,
}

/// Request body for `POST /api/ai/knowledge-base`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgeBaseRequest {
    /// Raw document text.
    #[serde(default)]
    pub text: String,
}

/// Request body for `POST /api/results/score`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    /// Document the exam was generated from.
    #[serde(default, alias = "pdfId")]
    pub document_id: String,
    /// The exam as it was presented.
    #[serde(alias = "examData")]
    pub exam: ExamPaper,
    /// The candidate's answers.
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code.
    pub error: ErrorCode,
    /// Short human-readable message. Never contains upstream text.
    pub message: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The gateway every handler delegates to.
    pub gateway: Gateway,
}

impl AppState {
    /// Creates a new `AppState` around a gateway.
    #[must_use]
    pub const fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Handler error carrying the gateway failure to render.
#[derive(Debug)]
struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(GatewayError::bad_request(format!(
            "Malformed request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let body = Json(ErrorResponse {
            error: code,
            message: self.0.public_message(),
        });
        debug!(code = %code, status = %code.status(), "Responding with error");

        let mut response = (code.status(), body).into_response();
        if let Some(secs) = self.0.retry_after_secs() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// Routes live under `/api`, wrapped in a permissive CORS layer and request
/// tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ai_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .route("/generate-mcqs", post(handle_generate_mcqs))
        .route("/generate-exam", post(handle_generate_exam))
        .route("/generate-notes", post(handle_generate_notes))
        .route("/knowledge-base", post(handle_knowledge_base));

    let result_routes = Router::new().route("/score", post(handle_score));

    Router::new()
        .nest("/api/ai", ai_routes)
        .nest("/api/results", result_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/ai/health`.
async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    let health = state.gateway.health();
    if health.healthy {
        return (StatusCode::OK, Json(health)).into_response();
    }

    let retry_after = health.retry_after_secs;
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json::<HealthStatus>(health)).into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

/// Handler for `POST /api/ai/ask`.
async fn handle_ask(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = payload?;
    info!(
        document_id = %request.document_id,
        question_len = request.question.len(),
        "Received question"
    );

    let answer = state
        .gateway
        .ask_document(&request.document_id, &request.question)
        .await?;
    Ok(Json(AskResponse { answer }))
}

/// Handler for `POST /api/ai/generate-mcqs`.
async fn handle_generate_mcqs(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<McqRequest>, JsonRejection>,
) -> Result<Json<Vec<McqItem>>, ApiError> {
    let Json(request) = payload?;
    let difficulty = request.difficulty.unwrap_or_default();
    info!(
        document_id = %request.document_id,
        difficulty = %difficulty,
        "Received MCQ request"
    );

    let items = state
        .gateway
        .generate_mcqs(
            &request.document_id,
            &difficulty,
            numeric_param(request.count.as_ref()),
        )
        .await?;
    Ok(Json(items))
}

/// Handler for `POST /api/ai/generate-exam`.
async fn handle_generate_exam(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExamRequest>, JsonRejection>,
) -> Result<Json<ExamPaper>, ApiError> {
    let Json(request) = payload?;
    let difficulty = request.difficulty.unwrap_or_default();
    info!(
        document_id = %request.document_id,
        difficulty = %difficulty,
        "Received exam request"
    );

    let paper = state
        .gateway
        .generate_exam(
            &request.document_id,
            numeric_param(request.duration.as_ref()),
            numeric_param(request.count.as_ref()),
            &difficulty,
        )
        .await?;
    Ok(Json(paper))
}

/// Handler for `POST /api/ai/generate-notes`.
async fn handle_generate_notes(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NotesRequest>, JsonRejection>,
) -> Result<Json<NotesResponse>, ApiError> {
    let Json(request) = payload?;
    let style = request.style.unwrap_or_default();
    info!(document_id = %request.document_id, style = %style, "Received notes request");

    let notes = state
        .gateway
        .generate_notes(&request.document_id, &style)
        .await?;
    Ok(Json(NotesResponse { notes }))
}

/// Handler for `POST /api/ai/knowledge-base`.
async fn handle_knowledge_base(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<KnowledgeBaseRequest>, JsonRejection>,
) -> Result<Json<KnowledgeBase>, ApiError> {
    let Json(request) = payload?;
    info!(text_len = request.text.len(), "Received knowledge-base request");

    let kb = state.gateway.extract_knowledge_base(&request.text).await?;
    Ok(Json(kb))
}

/// Handler for `POST /api/results/score`.
async fn handle_score(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Json<ScoredExam>, ApiError> {
    let Json(request) = payload?;
    info!(
        document_id = %request.document_id,
        answers = request.answers.len(),
        "Received exam submission"
    );

    let scored = state
        .gateway
        .score_exam(&request.document_id, &request.exam, &request.answers)
        .await?;
    Ok(Json(scored))
}

// ============================================================================
// Tests
// ============================================================================
