//! Error types for the Groundwork gateway.
//!
//! Errors come in two layers. [`UpstreamError`] is what the generation client
//! raises after classifying a failed upstream call; its raw detail is kept for
//! logs only. [`GatewayError`] is what every gateway operation returns, and
//! each variant maps to exactly one caller-facing [`ErrorCode`].

use std::path::PathBuf;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// A specialized `Result` type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

// ============================================================================
// Upstream classification
// ============================================================================

/// Categories of upstream generation API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// The API key was rejected.
    ApiKeyInvalid,
    /// The account is out of quota or credits.
    QuotaExceeded,
    /// Too many requests.
    RateLimit,
    /// The configured model has been retired.
    ModelDecommissioned,
    /// The service is temporarily down.
    ServiceUnavailable,
    /// The call succeeded but returned no text.
    InvalidResponse,
    /// Anything not recognized above.
    Other,
}

impl std::fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKeyInvalid => write!(f, "API_KEY_INVALID"),
            Self::QuotaExceeded => write!(f, "QUOTA_EXCEEDED"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::ModelDecommissioned => write!(f, "MODEL_DECOMMISSIONED"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
            Self::InvalidResponse => write!(f, "INVALID_RESPONSE"),
            Self::Other => write!(f, "GROQ_ERROR"),
        }
    }
}

impl UpstreamErrorKind {
    /// Returns a suggestion message for operators seeing this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::ApiKeyInvalid => "Check the GROQ_API_KEY environment variable",
            Self::QuotaExceeded => "Check the upstream account's billing and quota",
            Self::RateLimit => "Wait for the cooldown, or reduce request frequency",
            Self::ModelDecommissioned => "Update upstream.model in groundwork.json",
            Self::ServiceUnavailable => "Retry later; the upstream service is degraded",
            Self::InvalidResponse => "Retry the request; the model returned no text",
            Self::Other => "Check the upstream provider's status page",
        }
    }

    /// Returns the caller-facing code this kind surfaces as.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ApiKeyInvalid => ErrorCode::ConfigError,
            Self::QuotaExceeded => ErrorCode::QuotaExceeded,
            Self::RateLimit => ErrorCode::RateLimit,
            Self::ModelDecommissioned => ErrorCode::ModelUnavailable,
            Self::ServiceUnavailable | Self::Other => ErrorCode::ServiceUnavailable,
            Self::InvalidResponse => ErrorCode::GenerationFailed,
        }
    }
}

/// A classified upstream failure.
///
/// `detail` holds the raw upstream message. It is written to the log by the
/// client and never included in anything returned to a caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("upstream call failed ({kind})\n\nSuggestion: {}", .kind.suggestion())]
pub struct UpstreamError {
    /// The failure category.
    pub kind: UpstreamErrorKind,
    /// Raw upstream error text, for logs.
    pub detail: String,
}

impl UpstreamError {
    /// Creates a new upstream error.
    #[must_use]
    pub fn new(kind: UpstreamErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

// ============================================================================
// Caller-facing codes
// ============================================================================

/// Stable error identifiers returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The gateway has no credential or is misconfigured.
    ConfigError,
    /// Circuit open or upstream outage; retry later.
    ServiceUnavailable,
    /// Upstream rate limit; retry after a delay.
    RateLimit,
    /// Upstream billing or quota problem.
    QuotaExceeded,
    /// Upstream model retired; operator action needed.
    ModelUnavailable,
    /// A required parameter is missing or empty.
    BadRequest,
    /// Unknown document.
    NotFound,
    /// The document has no extractable text.
    EmptyContext,
    /// The model output was unusable; retrying may help.
    GenerationFailed,
}

impl ErrorCode {
    /// Returns the HTTP status this code is served with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ConfigError | Self::GenerationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable | Self::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            Self::QuotaExceeded => StatusCode::FORBIDDEN,
            Self::BadRequest | Self::EmptyContext => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Returns `true` if the same request may succeed when retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable | Self::RateLimit | Self::GenerationFailed
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::RateLimit => "RATE_LIMIT",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::ModelUnavailable => "MODEL_UNAVAILABLE",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::EmptyContext => "EMPTY_CONTEXT",
            Self::GenerationFailed => "GENERATION_FAILED",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Gateway errors
// ============================================================================

/// Errors returned by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    // ========================================================================
    // Configuration
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your groundwork.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// No upstream API key is available.
    #[error("Generation is not configured: no API key in '{env_var}'\n\nSuggestion: Export {env_var} before starting the gateway")]
    NotConfigured {
        /// Environment variable the key is read from.
        env_var: String,
    },

    // ========================================================================
    // Upstream
    // ========================================================================
    /// The circuit breaker is open; no upstream call was made.
    #[error("Upstream temporarily disabled for another {retry_after_secs}s")]
    CircuitOpen {
        /// Seconds until the circuit closes.
        retry_after_secs: u64,
    },

    /// The upstream call failed and was classified.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    // ========================================================================
    // Request validation and context
    // ========================================================================
    /// A required parameter is missing or empty.
    #[error("Bad request: {message}")]
    BadRequest {
        /// What is wrong with the request.
        message: String,
    },

    /// The requested document does not exist.
    #[error("Document not found: '{id}'")]
    DocumentNotFound {
        /// The requested document id.
        id: String,
    },

    /// The document has no usable text.
    #[error("Document '{id}' has no extractable text")]
    EmptyContext {
        /// The document id.
        id: String,
    },

    /// The model output could not be used.
    #[error("Generation failed: {message}")]
    GenerationFailed {
        /// What was wrong with the output.
        message: String,
    },

    // ========================================================================
    // Document loading
    // ========================================================================
    /// A document file exceeds the size limit.
    #[error("Document exceeds size limit ({limit_kb}KB): '{path}' is {size_kb}KB\n\nSuggestion: Split the document or raise the limit")]
    DocumentTooLarge {
        /// Path to the oversized file.
        path: PathBuf,
        /// Actual size in kilobytes.
        size_kb: u64,
        /// Limit in kilobytes.
        limit_kb: u64,
    },

    /// A document file is not valid UTF-8.
    #[error("Document has invalid encoding: '{path}'\n\nSuggestion: Convert the file to UTF-8 encoding")]
    DocumentEncodingError {
        /// Path to the file.
        path: PathBuf,
    },

    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `NotConfigured` error.
    #[must_use]
    pub fn not_configured(env_var: impl Into<String>) -> Self {
        Self::NotConfigured {
            env_var: env_var.into(),
        }
    }

    /// Creates a new `Upstream` error.
    #[must_use]
    pub fn upstream(kind: UpstreamErrorKind, detail: impl Into<String>) -> Self {
        Self::Upstream(UpstreamError::new(kind, detail))
    }

    /// Creates a new `BadRequest` error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new `DocumentNotFound` error.
    #[must_use]
    pub fn document_not_found(id: impl Into<String>) -> Self {
        Self::DocumentNotFound { id: id.into() }
    }

    /// Creates a new `EmptyContext` error.
    #[must_use]
    pub fn empty_context(id: impl Into<String>) -> Self {
        Self::EmptyContext { id: id.into() }
    }

    /// Creates a new `GenerationFailed` error.
    #[must_use]
    pub fn generation_failed(message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            message: message.into(),
        }
    }

    /// Returns the caller-facing code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ConfigParseError { .. }
            | Self::ConfigValidationError { .. }
            | Self::NotConfigured { .. }
            | Self::DocumentTooLarge { .. }
            | Self::DocumentEncodingError { .. }
            | Self::Io(_) => ErrorCode::ConfigError,
            Self::CircuitOpen { .. } => ErrorCode::ServiceUnavailable,
            Self::Upstream(err) => err.kind.code(),
            Self::BadRequest { .. } => ErrorCode::BadRequest,
            Self::DocumentNotFound { .. } => ErrorCode::NotFound,
            Self::EmptyContext { .. } => ErrorCode::EmptyContext,
            Self::GenerationFailed { .. } => ErrorCode::GenerationFailed,
        }
    }

    /// Returns the short message shown to callers.
    ///
    /// Upstream detail and file paths never appear here.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest { message } => message.clone(),
            Self::DocumentNotFound { .. } => "Document not found".to_string(),
            Self::EmptyContext { .. } => {
                "The document has no extractable text to work from".to_string()
            }
            Self::GenerationFailed { .. } => {
                "The AI produced an unusable response; please try again".to_string()
            }
            Self::CircuitOpen { retry_after_secs } => {
                format!("AI service temporarily unavailable; retry in {retry_after_secs}s")
            }
            Self::Upstream(err) => match err.kind {
                UpstreamErrorKind::ApiKeyInvalid => {
                    "AI service is misconfigured on the server".to_string()
                }
                UpstreamErrorKind::QuotaExceeded => "AI service quota exceeded".to_string(),
                UpstreamErrorKind::RateLimit => {
                    "AI service rate limit reached; please wait and retry".to_string()
                }
                UpstreamErrorKind::ModelDecommissioned => {
                    "The configured AI model is no longer available".to_string()
                }
                UpstreamErrorKind::InvalidResponse => {
                    "The AI returned an empty response; please try again".to_string()
                }
                UpstreamErrorKind::ServiceUnavailable | UpstreamErrorKind::Other => {
                    "AI service temporarily unavailable".to_string()
                }
            },
            Self::NotConfigured { .. }
            | Self::ConfigParseError { .. }
            | Self::ConfigValidationError { .. }
            | Self::DocumentTooLarge { .. }
            | Self::DocumentEncodingError { .. }
            | Self::Io(_) => "AI service is not configured on the server".to_string(),
        }
    }

    /// Returns the number of seconds a caller should wait before retrying.
    #[must_use]
    pub const fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::CircuitOpen { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.code().is_retryable()
    }

    /// Returns `true` if this error comes from a server-side misconfiguration.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.code(), ErrorCode::ConfigError | ErrorCode::ModelUnavailable)
    }
}
