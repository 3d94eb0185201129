use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::notify::{NotificationKind, NotificationLogEntry};
use crate::submission::Submission;

#[derive(Debug, FromRow)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub submission_number: String,
    pub status: String,
    pub version: i64,
    pub document: Json<Submission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRow {
    /// The column version is authoritative over the copy inside the document.
    pub fn into_submission(self) -> Submission {
        let mut submission = self.document.0;
        submission.version = self.version;
        submission
    }
}

#[derive(Debug, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub kind: Json<NotificationKind>,
    pub recipients: Vec<Uuid>,
    pub message: String,
    pub delivered: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationLogEntry {
    fn from(row: NotificationRow) -> Self {
        NotificationLogEntry {
            id: row.id,
            submission_id: row.submission_id,
            kind: row.kind.0,
            recipients: row.recipients,
            message: row.message,
            delivered: row.delivered,
            error: row.error,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct CollaboratorCount {
    pub user_id: Uuid,
    pub shared: i64,
}
