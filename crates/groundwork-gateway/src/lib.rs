//! Groundwork grounded generation gateway.
//!
//! Turns a document's extracted text into tutor answers, multiple-choice sets,
//! exam papers, study notes, and knowledge-base summaries by calling an
//! OpenAI-compatible chat-completions API with prompts that confine the model
//! to the document. A circuit breaker sheds load for a cooldown after any
//! upstream failure, and every failure surfaces as one stable [`ErrorCode`].

pub mod api;
pub mod circuit;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod prompt;
pub mod request_state;

pub use api::{
    create_router, AppState, AskRequest, AskResponse, ErrorResponse, ExamRequest,
    KnowledgeBaseRequest, McqRequest, NotesRequest, NotesResponse, ScoreRequest,
};
pub use circuit::CircuitBreaker;
pub use client::{
    classify_failure, ApiKeySource, BackendFailure, ChatBackend, ChatRequest, GenerationClient,
    GroqBackend, HealthReason, HealthStatus,
};
pub use config::{CircuitConfig, GatewayConfig, LimitsConfig, ServerConfig, UpstreamConfig};
pub use document::{Document, DocumentStore, MemoryDocumentStore, MAX_DOCUMENT_SIZE};
pub use error::{ErrorCode, GatewayError, Result, UpstreamError, UpstreamErrorKind};
pub use extract::extract_json;
pub use orchestrator::{Gateway, KnowledgeBase};
pub use prompt::{ChatMessage, Difficulty, NotesStyle, Prompt, REFUSAL_PHRASE};
pub use request_state::{RequestKind, RequestPhase, RequestTrace};
