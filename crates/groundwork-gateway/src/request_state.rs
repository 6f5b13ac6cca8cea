//! Per-request lifecycle tracking.
//!
//! Every gateway operation walks one [`RequestTrace`] through the phases
//!
//! - `Idle` -> `Validating` -> `ContextLoaded` -> `Prompting` -> `AwaitingUpstream` -> `Succeeded`
//! - any non-terminal phase -> `Failed`
//!
//! The trace is transient; it exists for structured logging and is dropped
//! when the request completes. There are no retries, so no phase is ever
//! re-entered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ErrorCode;

// ============================================================================
// RequestKind
// ============================================================================

/// Which gateway operation a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Tutor question answering.
    Ask,
    /// Multiple-choice set generation.
    McqSet,
    /// Exam paper generation.
    Exam,
    /// Study notes generation.
    Notes,
    /// Knowledge-base extraction.
    KnowledgeBase,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ask => "ask",
            Self::McqSet => "mcq_set",
            Self::Exam => "exam",
            Self::Notes => "notes",
            Self::KnowledgeBase => "knowledge_base",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// RequestPhase
// ============================================================================

/// Lifecycle phase of a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    /// Created, nothing checked yet.
    #[default]
    Idle,
    /// Checking health and parameters.
    Validating,
    /// Document text loaded and truncated to budget.
    ContextLoaded,
    /// Building the prompt.
    Prompting,
    /// Waiting for the upstream completion.
    AwaitingUpstream,
    /// Finished with a usable result.
    Succeeded,
    /// Finished with an error.
    Failed,
}

impl RequestPhase {
    /// Returns `true` if this phase ends the request.
    ///
    /// # Examples
    ///
    /// ```
    /// use groundwork_gateway::RequestPhase;
    ///
    /// assert!(RequestPhase::Succeeded.is_terminal());
    /// assert!(RequestPhase::Failed.is_terminal());
    /// assert!(!RequestPhase::AwaitingUpstream.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Idle, Self::Validating)
            | (Self::Validating, Self::ContextLoaded)
            | (Self::ContextLoaded, Self::Prompting)
            | (Self::Prompting, Self::AwaitingUpstream)
            | (Self::AwaitingUpstream, Self::Succeeded) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::ContextLoaded => "context_loaded",
            Self::Prompting => "prompting",
            Self::AwaitingUpstream => "awaiting_upstream",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// RequestTrace
// ============================================================================

/// Lifecycle record of one gateway request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTrace {
    /// The operation.
    pub kind: RequestKind,

    /// The document the request works on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    /// Current phase.
    pub phase: RequestPhase,

    /// Caller-facing code, once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,

    /// When the request started.
    pub started_at: DateTime<Utc>,

    /// When the phase last changed.
    pub updated_at: DateTime<Utc>,
}

impl RequestTrace {
    /// Creates a trace in the `Idle` phase.
    #[must_use]
    pub fn new(kind: RequestKind, document_id: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            kind,
            document_id: document_id.map(str::to_string),
            phase: RequestPhase::Idle,
            error_code: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next` if the transition is legal.
    ///
    /// Illegal transitions are logged and leave the phase unchanged. Returns
    /// whether the transition happened.
    pub fn advance(&mut self, next: RequestPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            warn!(
                kind = %self.kind,
                from = %self.phase,
                to = %next,
                "Ignoring illegal request phase transition"
            );
            return false;
        }
        self.phase = next;
        self.touch();
        true
    }

    /// Marks the request failed with the given caller-facing code.
    pub fn fail(&mut self, code: ErrorCode) {
        if self.advance(RequestPhase::Failed) {
            self.error_code = Some(code);
        }
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns the duration since the request started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }

    /// Returns `true` if the request has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

// ============================================================================
// Tests
// ============================================================================
