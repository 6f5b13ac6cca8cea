//! Upstream generation client.
//!
//! [`GenerationClient`] owns connectivity to the OpenAI-compatible chat
//! completions API: it checks the circuit breaker before every dispatch,
//! resolves the API key, sends one non-streaming completion at temperature 0,
//! and classifies failures into [`UpstreamErrorKind`]s. Every classified
//! failure trips the breaker.
//!
//! The HTTP transport sits behind the [`ChatBackend`] trait so tests can swap
//! in a scripted backend and count upstream calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::circuit::CircuitBreaker;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result, UpstreamErrorKind};
use crate::prompt::{ChatMessage, Prompt};

// ============================================================================
// Transport
// ============================================================================

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Response body of `POST /chat/completions`, reduced to what is read.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A failed transport call, before classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream transport failure (status {status:?}): {message}")]
pub struct BackendFailure {
    /// HTTP status, if a response was received.
    pub status: Option<u16>,
    /// Error text from the response body or the transport.
    pub message: String,
}

impl BackendFailure {
    /// Creates a new backend failure.
    #[must_use]
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Sends one chat completion request upstream.
///
/// Returns `Ok(None)` when the call succeeded but carried no text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Performs the completion call.
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> std::result::Result<Option<String>, BackendFailure>;
}

/// `reqwest` transport for Groq's OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct GroqBackend {
    http: reqwest::Client,
    endpoint: String,
}

impl GroqBackend {
    /// Creates a backend posting to `{base_url}/chat/completions`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigValidationError` if the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                GatewayError::config_validation(
                    format!("cannot build HTTP client: {e}"),
                    "Check the TLS setup of the host",
                )
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Returns the completions endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for GroqBackend {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> std::result::Result<Option<String>, BackendFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendFailure::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendFailure::new(
                Some(status.as_u16()),
                upstream_error_message(&body),
            ));
        }

        match response.json::<ChatCompletionResponse>().await {
            Ok(body) => Ok(body
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)),
            Err(e) => {
                warn!(error = %e, "Upstream completion body did not parse");
                Ok(None)
            }
        }
    }
}

/// Pulls `error.message` out of an OpenAI-style error body, else the raw body.
fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// Classification
// ============================================================================

struct Classifier {
    kind: UpstreamErrorKind,
    statuses: &'static [u16],
    pattern: Regex,
}

/// Ordered rules; the first match wins.
const RULES: [(UpstreamErrorKind, &[u16], &str); 5] = [
    (
        UpstreamErrorKind::ApiKeyInvalid,
        &[401],
        r"(?i)\b401\b|api key|invalid key",
    ),
    (
        UpstreamErrorKind::QuotaExceeded,
        &[403],
        r"(?i)quota|insufficient credits|billing",
    ),
    (
        UpstreamErrorKind::RateLimit,
        &[429],
        r"(?i)too many requests|rate limit",
    ),
    (UpstreamErrorKind::ModelDecommissioned, &[], r"(?i)decommission"),
    (
        UpstreamErrorKind::ServiceUnavailable,
        &[503],
        r"(?i)\b503\b|service unavailable|temporarily unavailable",
    ),
];

static CLASSIFIERS: Lazy<Vec<Classifier>> = Lazy::new(|| {
    RULES
        .iter()
        .filter_map(|(kind, statuses, pattern)| {
            Regex::new(pattern).ok().map(|pattern| Classifier {
                kind: *kind,
                statuses: *statuses,
                pattern,
            })
        })
        .collect()
});

/// Classifies a failed upstream call by status code and error text.
#[must_use]
pub fn classify_failure(status: Option<u16>, message: &str) -> UpstreamErrorKind {
    CLASSIFIERS
        .iter()
        .find(|c| {
            status.is_some_and(|s| c.statuses.contains(&s)) || c.pattern.is_match(message)
        })
        .map_or(UpstreamErrorKind::Other, |c| c.kind)
}

// ============================================================================
// Credentials and health
// ============================================================================

/// Where the upstream API key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    /// Read from the named environment variable on every call.
    Env(String),
    /// A fixed key, or none at all.
    Fixed(Option<String>),
}

impl ApiKeySource {
    /// Returns the key, if one is available and non-blank.
    #[must_use]
    pub fn resolve(&self) -> Option<String> {
        let key = match self {
            Self::Env(var) => std::env::var(var).ok(),
            Self::Fixed(key) => key.clone(),
        };
        key.filter(|k| !k.trim().is_empty())
    }

    fn describe(&self) -> &str {
        match self {
            Self::Env(var) => var,
            Self::Fixed(_) => "<fixed key>",
        }
    }
}

/// Why the client reports itself unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthReason {
    /// A recent failure opened the circuit.
    CircuitOpen,
    /// No API key is available.
    NotConfigured,
}

/// Result of a health check. Computing it never performs I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Whether generation calls would currently be dispatched.
    pub healthy: bool,

    /// Why not, if unhealthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<HealthReason>,

    /// Seconds until the circuit closes, while it is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

// ============================================================================
// Client
// ============================================================================

/// Circuit-guarded client for the upstream generation API.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn ChatBackend>,
    credentials: ApiKeySource,
    model: String,
    circuit: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("credentials", &self.credentials.describe())
            .field("model", &self.model)
            .field("circuit", &self.circuit)
            .finish_non_exhaustive()
    }
}

impl GenerationClient {
    /// Creates a client over an arbitrary backend.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        credentials: ApiKeySource,
        model: impl Into<String>,
        circuit: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            backend,
            credentials,
            model: model.into(),
            circuit,
        }
    }

    /// Creates a Groq-backed client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let backend = GroqBackend::new(&config.upstream.base_url, config.upstream.timeout())?;
        info!(
            endpoint = %backend.endpoint(),
            model = %config.upstream.model,
            "Configured upstream generation API"
        );

        Ok(Self::new(
            Arc::new(backend),
            ApiKeySource::Env(config.upstream.api_key_env.clone()),
            config.upstream.model.clone(),
            Arc::new(CircuitBreaker::new(config.circuit.cooldown())),
        ))
    }

    /// Returns the model every request uses.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the circuit breaker this client trips.
    #[must_use]
    pub const fn circuit(&self) -> &Arc<CircuitBreaker> {
        &self.circuit
    }

    /// Returns `true` if an API key is available. Performs no I/O.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.credentials.resolve().is_some()
    }

    /// Reports whether calls would currently be dispatched. Performs no I/O.
    #[must_use]
    pub fn is_healthy(&self) -> HealthStatus {
        if let Some(retry_after_secs) = self.circuit.retry_after_secs() {
            return HealthStatus {
                healthy: false,
                reason: Some(HealthReason::CircuitOpen),
                retry_after_secs: Some(retry_after_secs),
            };
        }

        if !self.is_configured() {
            return HealthStatus {
                healthy: false,
                reason: Some(HealthReason::NotConfigured),
                retry_after_secs: None,
            };
        }

        HealthStatus {
            healthy: true,
            reason: None,
            retry_after_secs: None,
        }
    }

    /// Returns the error a call would fail with right now, without dispatching.
    #[must_use]
    pub fn availability_error(&self) -> Option<GatewayError> {
        if let Some(retry_after_secs) = self.circuit.retry_after_secs() {
            return Some(GatewayError::CircuitOpen { retry_after_secs });
        }
        if !self.is_configured() {
            return Some(GatewayError::not_configured(self.credentials.describe()));
        }
        None
    }

    /// Sends the prompt upstream and returns the completion text.
    ///
    /// Fails with `CircuitOpen` without any network call while the breaker is
    /// open. Any classified failure, including an empty completion, trips the
    /// breaker.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::CircuitOpen`, `GatewayError::NotConfigured`,
    /// `GatewayError::BadRequest` for a prompt with no messages, or
    /// `GatewayError::Upstream` carrying the classified failure.
    pub async fn generate_text(&self, prompt: Prompt) -> Result<String> {
        if let Some(retry_after_secs) = self.circuit.retry_after_secs() {
            debug!(retry_after_secs, "Circuit open, refusing upstream call");
            return Err(GatewayError::CircuitOpen { retry_after_secs });
        }

        let Some(api_key) = self.credentials.resolve() else {
            return Err(GatewayError::not_configured(self.credentials.describe()));
        };

        let messages = prompt.into_messages();
        if messages.is_empty() {
            return Err(GatewayError::bad_request("Prompt has no messages"));
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.0,
        };

        debug!(model = %request.model, messages = request.messages.len(), "Dispatching completion");

        match self.backend.complete(&api_key, &request).await {
            Ok(Some(text)) if !text.is_empty() => Ok(text),
            Ok(_) => Err(self.fail(
                UpstreamErrorKind::InvalidResponse,
                "completion carried no text content",
            )),
            Err(failure) => {
                let kind = classify_failure(failure.status, &failure.message);
                Err(self.fail(kind, failure.to_string()))
            }
        }
    }

    fn fail(&self, kind: UpstreamErrorKind, detail: impl Into<String>) -> GatewayError {
        let detail = detail.into();
        warn!(kind = %kind, detail = %detail, "Upstream generation failed");
        self.circuit.trip(&kind.to_string());
        GatewayError::upstream(kind, detail)
    }
}
