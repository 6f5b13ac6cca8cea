//! Groundwork CLI
//!
//! Serves the grounded generation gateway over HTTP and scores answers offline.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use groundwork_eval::{evaluate_freeform_answer, score_exam, ExamPaper, SubmittedAnswer};
use groundwork_gateway::{create_router, AppState, Gateway, GatewayConfig, MemoryDocumentStore};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Groundwork - Grounded Generation Gateway
///
/// Answers questions, writes quizzes, exams, and study notes strictly from
/// uploaded document text, and scores submitted answers against it.
#[derive(Parser, Debug)]
#[command(name = "groundwork")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: groundwork.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server
    Serve {
        /// Port for the HTTP API server (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory of extracted-text documents (overrides the config file)
        #[arg(short, long, value_name = "DIR")]
        documents: Option<String>,
    },

    /// Score a free-form answer against a document's text
    Evaluate {
        /// Path to the document's extracted text
        #[arg(short, long, value_name = "FILE")]
        document: PathBuf,

        /// The answer to score
        #[arg(short, long)]
        answer: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score submitted exam answers
    Score {
        /// Path to the exam paper JSON
        #[arg(short, long, value_name = "FILE")]
        exam: PathBuf,

        /// Path to the submitted answers JSON array
        #[arg(short, long, value_name = "FILE")]
        answers: PathBuf,

        /// Path to the document's extracted text
        #[arg(short, long, value_name = "FILE")]
        document: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!(config = ?args.config, "Config file");

    let result = match args.command {
        Command::Serve {
            port,
            host,
            documents,
        } => run_server(args.config.as_deref(), port, &host, documents).await,
        Command::Evaluate {
            document,
            answer,
            json,
        } => run_evaluate(&document, &answer, json),
        Command::Score {
            exam,
            answers,
            document,
            json,
        } => run_score(&exam, &answers, &document, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads documents, builds the gateway, and serves the HTTP API until Ctrl+C.
async fn run_server(
    config_path: Option<&str>,
    port: Option<u16>,
    host: &str,
    documents: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(documents) = documents {
        config.documents_dir = documents;
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let store = MemoryDocumentStore::load_dir(Path::new(&config.documents_dir))?;
    println!("  Documents loaded: {}", store.len().await);

    let gateway = Gateway::from_config(&config, Arc::new(store))?;
    let health = gateway.health();
    if !health.healthy {
        tracing::warn!(
            reason = ?health.reason,
            api_key_env = %config.upstream.api_key_env,
            "Gateway starting unhealthy; generation requests will be refused"
        );
    }

    let addr: SocketAddr = format!("{host}:{}", config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{host}': {e}"))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, create_router(AppState::new(gateway)))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

/// Scores one free-form answer against a document and prints the result.
fn run_evaluate(document: &Path, answer: &str, json: bool) -> anyhow::Result<()> {
    let text = read_document(document)?;
    let result = evaluate_freeform_answer(answer, &text);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Score: {}/100", result.score);
    println!("Similarity: {:.3}", result.similarity);
    println!("Feedback: {}", result.feedback);
    if !result.suggestions.is_empty() {
        println!("Review these passages:");
        for suggestion in &result.suggestions {
            println!("  - {suggestion}");
        }
    }
    Ok(())
}

/// Scores a submitted exam from JSON files and prints the result.
fn run_score(exam: &Path, answers: &Path, document: &Path, json: bool) -> anyhow::Result<()> {
    let paper: ExamPaper = read_json(exam)?;
    let submitted: Vec<SubmittedAnswer> = read_json(answers)?;
    let text = read_document(document)?;

    tracing::info!(
        questions = paper.questions.len(),
        answers = submitted.len(),
        "Scoring exam"
    );
    let scored = score_exam(&paper, &submitted, &text);

    if json {
        println!("{}", serde_json::to_string_pretty(&scored)?);
        return Ok(());
    }

    println!("=== {} ===", display_title(&paper));
    for answer in &scored.scored_answers {
        let mark = if answer.is_correct { "correct" } else { "incorrect" };
        print!(
            "  Q{}: {mark} ({} pts)",
            answer.question_id, answer.awarded_points
        );
        if let Some(eval) = &answer.evaluation {
            print!(" - {}", eval.feedback);
        }
        println!();
    }
    println!();
    println!("{}", scored.feedback);
    Ok(())
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<GatewayConfig> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            GatewayConfig::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => GatewayConfig::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read document '{}': {e}\n\nSuggestion: Pass the extracted plain-text file",
            path.display()
        )
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in '{}': {e}", path.display()))
}

fn display_title(paper: &ExamPaper) -> &str {
    if paper.title.trim().is_empty() {
        "Exam"
    } else {
        &paper.title
    }
}

/// Prints the loaded configuration.
fn print_config(config: &GatewayConfig) {
    println!("Configuration loaded:");
    println!("  Upstream: {}", config.upstream.base_url);
    println!("  Model: {}", config.upstream.model);
    println!("  API key variable: {}", config.upstream.api_key_env);
    println!("  Circuit cooldown: {}s", config.circuit.cooldown_secs);
    println!("  Documents directory: {}", config.documents_dir);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let args = Args::try_parse_from(["groundwork", "serve"]).unwrap();
        assert!(!args.verbose);
        let Command::Serve {
            port,
            host,
            documents,
        } = args.command
        else {
            unreachable!("parsed a different subcommand");
        };
        assert_eq!(port, None);
        assert_eq!(host, "127.0.0.1");
        assert_eq!(documents, None);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "groundwork",
            "evaluate",
            "--document",
            "doc.txt",
            "--answer",
            "An object in motion",
            "-v",
            "--config",
            "custom.json",
        ])
        .unwrap();
        assert!(args.verbose);
        assert_eq!(args.config.as_deref(), Some("custom.json"));
    }

    #[test]
    fn test_score_requires_all_files() {
        assert!(Args::try_parse_from(["groundwork", "score", "--exam", "exam.json"]).is_err());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let err = load_config(Some("/definitely/not/groundwork.json")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_display_title_fallback() {
        assert_eq!(display_title(&ExamPaper::default()), "Exam");
    }
}
