//! End-to-end integration tests for the Groundwork gateway
//!
//! Each test starts an in-process fake of the OpenAI-compatible completions
//! API, points the real HTTP transport at it, and drives the gateway's own
//! HTTP API with `reqwest`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use groundwork_gateway::{
    create_router, ApiKeySource, AppState, CircuitBreaker, ErrorCode, ErrorResponse, Gateway,
    GenerationClient, GroqBackend, HealthReason, HealthStatus, LimitsConfig, MemoryDocumentStore,
    REFUSAL_PHRASE,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const API_KEY: &str = "test-key";
const MODEL: &str = "llama-3.1-8b-instant";

// ============================================================================
// Fake upstream
// ============================================================================

/// How the fake upstream answers the next requests.
#[derive(Debug, Clone)]
enum Mode {
    /// Answer like a well-behaved grounded model.
    Grounded,
    /// Fail with the given status and OpenAI-style error message.
    Fail(u16, &'static str),
    /// Return a 200 whose body is not a completion.
    Garbage,
}

#[derive(Debug)]
struct FakeUpstream {
    hits: AtomicUsize,
    mode: Mutex<Mode>,
    requests: Mutex<Vec<Value>>,
}

impl FakeUpstream {
    fn new() -> Self {
        Self {
            hits: AtomicUsize::new(0),
            mode: Mutex::new(Mode::Grounded),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn set_mode(&self, mode: Mode) {
        *self.mode.lock().expect("mode lock") = mode;
    }

    fn last_request(&self) -> Value {
        self.requests
            .lock()
            .expect("requests lock")
            .last()
            .cloned()
            .expect("no upstream request recorded")
    }
}

async fn handle_completion(
    State(fake): State<Arc<FakeUpstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    fake.requests.lock().expect("requests lock").push(body.clone());

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {API_KEY}"));
    if !authorized {
        return error_reply(401, "Invalid API Key");
    }

    let mode = fake.mode.lock().expect("mode lock").clone();
    match mode {
        Mode::Grounded => completion(&grounded_reply(&body)),
        Mode::Fail(status, message) => error_reply(status, message),
        Mode::Garbage => (StatusCode::OK, "<html>gateway hiccup</html>").into_response(),
    }
}

fn completion(text: &str) -> Response {
    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": MODEL,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

fn error_reply(status: u16, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": {"message": message}}))).into_response()
}

/// Plays a model that follows the grounding rules it is given.
fn grounded_reply(body: &Value) -> String {
    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let content_of = |role: &str| {
        messages
            .iter()
            .filter(|m| m["role"] == role)
            .filter_map(|m| m["content"].as_str())
            .collect::<Vec<_>>()
            .join("\n")
    };
    let system = content_of("system");
    let user = content_of("user");

    if user.contains("multiple-choice questions") {
        return r#"```json
[
  {"question": "What is the tendency to resist changes in motion called?", "options": ["A) Acceleration", "B) Inertia", "C) Reaction", "D) Mass"], "answer": "B", "explanation": "This tendency to resist changes in motion is called inertia."},
  {"question": "What does Newton's Third Law state?", "options": ["A) For every action there is an equal and opposite reaction", "B) Objects fall", "C) Mass is energy", "D) Nothing moves"], "answer": "A", "explanation": "For every action there is an equal and opposite reaction."}
]
```"#
            .to_string();
    }

    if system.contains("object in motion") && user.to_lowercase().contains("first law") {
        return "According to the document, an object in motion stays in motion with the same \
                speed and in the same direction unless acted upon by an unbalanced force."
            .to_string();
    }

    REFUSAL_PHRASE.to_string()
}

// ============================================================================
// Harness
// ============================================================================

/// Path to the fixture directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

struct Harness {
    fake: Arc<FakeUpstream>,
    base: String,
    http: reqwest::Client,
}

impl Harness {
    async fn start(api_key: Option<&str>) -> Self {
        let fake = Arc::new(FakeUpstream::new());
        let upstream = Router::new()
            .route("/chat/completions", post(handle_completion))
            .with_state(Arc::clone(&fake));
        let upstream_addr = spawn(upstream).await;

        let backend = GroqBackend::new(&format!("http://{upstream_addr}"), Duration::from_secs(5))
            .expect("Failed to build backend");
        let client = GenerationClient::new(
            Arc::new(backend),
            ApiKeySource::Fixed(api_key.map(str::to_string)),
            MODEL,
            Arc::new(CircuitBreaker::new(Duration::from_secs(60))),
        );
        let store = MemoryDocumentStore::load_dir(&fixture_path().join("documents"))
            .expect("Failed to load fixture documents");
        let gateway = Gateway::new(client, Arc::new(store), LimitsConfig::default());

        let api_addr = spawn(create_router(AppState::new(gateway))).await;

        Self {
            fake,
            base: format!("http://{api_addr}"),
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.http
            .post(format!("{}{path}", self.base))
            .json(body)
            .send()
            .await
            .expect("Request to gateway failed")
    }

    async fn ask(&self, document_id: &str, question: &str) -> reqwest::Response {
        self.post(
            "/api/ai/ask",
            &json!({"documentId": document_id, "question": question}),
        )
        .await
    }

    async fn health(&self) -> (reqwest::StatusCode, HealthStatus) {
        let response = self
            .http
            .get(format!("{}/api/ai/health", self.base))
            .send()
            .await
            .expect("Health request failed");
        let status = response.status();
        (status, response.json().await.expect("Health body"))
    }
}

async fn error_body(response: reqwest::Response) -> ErrorResponse {
    response.json().await.expect("Error body")
}

// ============================================================================
// Tests
// ============================================================================

/// A grounded question is answered from the document.
#[tokio::test]
async fn test_grounded_answer_end_to_end() {
    let harness = Harness::start(Some(API_KEY)).await;

    let response = harness.ask("newton", "What is Newton's First Law?").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.expect("Answer body");
    let answer = body["answer"].as_str().expect("answer field");
    assert!(answer.contains("object in motion"), "got: {answer}");

    let request = harness.fake.last_request();
    assert_eq!(request["model"], MODEL);
    assert_eq!(request["temperature"], 0.0);
    assert_eq!(request["messages"][0]["role"], "system");
    assert_eq!(request["messages"][1]["content"], "What is Newton's First Law?");
}

/// A question the document cannot answer gets the fixed refusal phrase.
#[tokio::test]
async fn test_off_document_question_is_refused() {
    let harness = Harness::start(Some(API_KEY)).await;

    let response = harness.ask("newton", "What is the capital of France?").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.expect("Answer body");
    assert_eq!(body["answer"], REFUSAL_PHRASE);
}

/// Blank documents fail before any upstream traffic.
#[tokio::test]
async fn test_blank_document_makes_no_upstream_call() {
    let harness = Harness::start(Some(API_KEY)).await;

    let response = harness.ask("blank", "What is Newton's First Law?").await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await.error, ErrorCode::EmptyContext);

    let response = harness
        .post("/api/ai/generate-mcqs", &json!({"documentId": "blank"}))
        .await;
    assert_eq!(error_body(response).await.error, ErrorCode::EmptyContext);

    assert_eq!(harness.fake.hits(), 0);
}

/// Non-text files in the documents directory are not loaded.
#[tokio::test]
async fn test_non_text_files_are_not_documents() {
    let harness = Harness::start(Some(API_KEY)).await;

    let response = harness.ask("readme", "Anything?").await;
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(error_body(response).await.error, ErrorCode::NotFound);
}

/// A rate-limited upstream opens the circuit; later calls are shed locally.
#[tokio::test]
async fn test_rate_limit_opens_circuit() {
    let harness = Harness::start(Some(API_KEY)).await;
    harness.fake.set_mode(Mode::Fail(
        429,
        "Rate limit reached for model in organization org_secret on tokens per minute",
    ));

    let response = harness.ask("newton", "What is Newton's First Law?").await;
    assert_eq!(response.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    let error = error_body(response).await;
    assert_eq!(error.error, ErrorCode::RateLimit);
    assert!(!error.message.contains("org_secret"));

    harness.fake.set_mode(Mode::Grounded);
    let response = harness.ask("newton", "What is Newton's First Law?").await;
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let retry_after: u64 = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("Retry-After header");
    assert!((1..=60).contains(&retry_after));
    assert_eq!(error_body(response).await.error, ErrorCode::ServiceUnavailable);

    assert_eq!(harness.fake.hits(), 1);

    let (status, health) = harness.health().await;
    assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert!(!health.healthy);
    assert_eq!(health.reason, Some(HealthReason::CircuitOpen));
    assert!(health.retry_after_secs.is_some());
}

/// An upstream key rejection surfaces as a server configuration error.
#[tokio::test]
async fn test_rejected_api_key_is_config_error() {
    let harness = Harness::start(Some("wrong-key")).await;

    let response = harness.ask("newton", "What is Newton's First Law?").await;
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let error = error_body(response).await;
    assert_eq!(error.error, ErrorCode::ConfigError);
    assert!(!error.message.contains("Invalid API Key"));
}

/// Without an API key nothing is sent upstream.
#[tokio::test]
async fn test_unconfigured_gateway() {
    let harness = Harness::start(None).await;

    let (status, health) = harness.health().await;
    assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health.reason, Some(HealthReason::NotConfigured));

    let response = harness.ask("newton", "What is Newton's First Law?").await;
    assert_eq!(error_body(response).await.error, ErrorCode::ConfigError);

    let response = harness
        .post("/api/ai/knowledge-base", &json!({"text": "Some text."}))
        .await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let kb: Value = response.json().await.expect("Knowledge base body");
    assert_eq!(kb, json!({"topics": [], "concepts": [], "summary": ""}));

    assert_eq!(harness.fake.hits(), 0);
}

/// A 200 without a usable completion is an invalid response and trips the circuit.
#[tokio::test]
async fn test_unparseable_completion_trips_circuit() {
    let harness = Harness::start(Some(API_KEY)).await;
    harness.fake.set_mode(Mode::Garbage);

    let response = harness.ask("newton", "What is Newton's First Law?").await;
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_body(response).await.error, ErrorCode::GenerationFailed);

    let (status, _) = harness.health().await;
    assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
}

/// MCQ output wrapped in a markdown fence is recovered.
#[tokio::test]
async fn test_generate_mcqs_from_fenced_output() {
    let harness = Harness::start(Some(API_KEY)).await;

    let response = harness
        .post(
            "/api/ai/generate-mcqs",
            &json!({"documentId": "newton", "difficulty": "hard", "count": 200}),
        )
        .await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let items: Vec<Value> = response.json().await.expect("MCQ body");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["answer"], "B");

    let request = harness.fake.last_request();
    let user = request["messages"][1]["content"].as_str().expect("user message");
    assert!(user.contains("TARGET COUNT: 50"));
    assert!(user.contains("DIFFICULTY: hard"));
}

/// Concurrent requests are all served; nothing is queued or serialized away.
#[tokio::test]
async fn test_concurrent_requests() {
    let harness = Harness::start(Some(API_KEY)).await;

    let requests = (0..8).map(|_| harness.ask("newton", "What is Newton's First Law?"));
    let responses = futures::future::join_all(requests).await;

    for response in responses {
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }
    assert_eq!(harness.fake.hits(), 8);
}

/// Exam submissions are scored against the stored document without upstream calls.
#[tokio::test]
async fn test_score_submission_over_http() {
    let harness = Harness::start(Some(API_KEY)).await;
    let exam: Value = serde_json::from_str(
        &std::fs::read_to_string(fixture_path().join("exam.json")).expect("exam fixture"),
    )
    .expect("exam JSON");
    let answers: Value = serde_json::from_str(
        &std::fs::read_to_string(fixture_path().join("answers.json")).expect("answers fixture"),
    )
    .expect("answers JSON");

    let response = harness
        .post(
            "/api/results/score",
            &json!({"documentId": "newton", "examData": exam, "answers": answers}),
        )
        .await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let scored: Value = response.json().await.expect("Score body");
    assert_eq!(scored["totalPoints"], 10);
    assert_eq!(scored["scoredAnswers"].as_array().map(Vec::len), Some(6));
    assert_eq!(scored["scoredAnswers"][0]["isCorrect"], true);
    assert_eq!(scored["scoredAnswers"][1]["isCorrect"], true);
    assert_eq!(harness.fake.hits(), 0);
}
