//! Document access for the gateway.
//!
//! The gateway only ever reads a document's extracted text. Text extraction
//! happens elsewhere; this module defines the store seam the orchestrator
//! reads through and an in-memory store that can be filled from a directory
//! of `*.txt` files.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};

/// Maximum allowed document file size in bytes (10MB).
pub const MAX_DOCUMENT_SIZE: u64 = 10 * 1024 * 1024;

/// A document whose text has been extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document identifier.
    pub id: String,

    /// Plain text extracted from the original upload.
    #[serde(default)]
    pub extracted_text: String,

    /// Whether extraction has run.
    #[serde(default)]
    pub is_processed: bool,
}

impl Document {
    /// Creates a processed document.
    #[must_use]
    pub fn new(id: impl Into<String>, extracted_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extracted_text: extracted_text.into(),
            is_processed: true,
        }
    }

    /// Returns `true` if the document has non-whitespace text.
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.extracted_text.trim().is_empty()
    }

    /// Loads a document from a UTF-8 text file, keyed by the file stem.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::DocumentTooLarge` if the file exceeds
    /// [`MAX_DOCUMENT_SIZE`], `GatewayError::DocumentEncodingError` if it is
    /// not valid UTF-8, and `GatewayError::Io` for other read failures.
    pub fn load_file(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;

        let file_size = metadata.len();
        if file_size > MAX_DOCUMENT_SIZE {
            return Err(GatewayError::DocumentTooLarge {
                path: path.to_path_buf(),
                size_kb: file_size / 1024,
                limit_kb: MAX_DOCUMENT_SIZE / 1024,
            });
        }

        let extracted_text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                GatewayError::DocumentEncodingError {
                    path: path.to_path_buf(),
                }
            } else {
                GatewayError::Io(e)
            }
        })?;

        let id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self::new(id, extracted_text))
    }
}

/// Read access to extracted documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the document with `id`, if it exists.
    async fn get_document(&self, id: &str) -> Option<Document>;
}

/// A document store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given documents.
    #[must_use]
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let documents = documents
            .into_iter()
            .map(|doc| (doc.id.clone(), doc))
            .collect();
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Loads every `*.txt` file in `dir` as a document keyed by file stem.
    ///
    /// A missing directory yields an empty store. Files that are too large or
    /// not UTF-8 are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Io` if the directory exists but cannot be read.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "Documents directory not found, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(GatewayError::Io(e)),
        };

        let mut documents = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_text = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
            if !path.is_file() || !is_text {
                continue;
            }

            match Document::load_file(&path) {
                Ok(doc) => {
                    debug!(id = %doc.id, chars = doc.extracted_text.len(), "Loaded document");
                    documents.push(doc);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping document"),
            }
        }

        info!(dir = %dir.display(), count = documents.len(), "Loaded documents");
        Ok(Self::with_documents(documents))
    }

    /// Inserts or replaces a document.
    pub async fn insert(&self, document: Document) {
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns `true` if the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, id: &str) -> Option<Document> {
        self.documents.read().await.get(id).cloned()
    }
}
