//! Document Store collaborator and identifier generation.
//!
//! The engine never inspects file bytes; it only keeps the `DocumentRef`
//! handed back by whichever store accepted the upload.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque reference to an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// A binary plus the metadata the uploader supplied.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn store(&self, upload: DocumentUpload) -> Result<DocumentRef>;
}

/// Writes uploads into a local folder, one file per document id.
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_dir(&root)?;
        Ok(Self { root })
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn store(&self, upload: DocumentUpload) -> Result<DocumentRef> {
        let filename = sanitize_filename(&upload.filename)?;
        let document_id = generate_document_id();
        let path = self.root.join(format!("{}_{}", document_id, filename));

        tokio::fs::write(&path, &upload.bytes).await?;

        let content_type = mime_guess::from_path(&filename)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();

        tracing::debug!("Stored document {} at {}", document_id, path.display());

        Ok(DocumentRef {
            document_id,
            filename,
            content_type,
            size_bytes: upload.bytes.len() as u64,
            uploaded_at: Utc::now(),
        })
    }
}

fn sanitize_filename(filename: &str) -> Result<String> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::trim)
        .unwrap_or("");
    if name.is_empty() || name.contains("..") {
        return Err(Error::Validation(format!("invalid filename '{}'", filename)));
    }
    Ok(name.to_string())
}

pub fn generate_document_id() -> String {
    format!(
        "{}_{}",
        Utc::now().format("%Y%m%d"),
        &Uuid::new_v4().simple().to_string()[..12]
    )
}

/// Human-readable submission number, assigned once at creation.
pub fn generate_submission_number(conference_year: i32) -> String {
    format!(
        "SOBIE-{}-{}",
        conference_year,
        &Uuid::new_v4().simple().to_string()[..8]
    )
}

pub fn ensure_dir(folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(folder)
}
