use async_trait::async_trait;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::models::{CollaboratorCount, NotificationRow, SubmissionRow};
use super::SubmissionStore;
use crate::error::{Error, Result};
use crate::notify::NotificationLogEntry;
use crate::submission::Submission;

#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: Arc<PgPool>,
}

impl PgSubmissionStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn write_authors(
        tx: &mut Transaction<'_, Postgres>,
        submission: &Submission,
    ) -> Result<()> {
        sqlx::query("DELETE FROM submission_authors WHERE submission_id = $1")
            .bind(submission.id)
            .execute(&mut **tx)
            .await?;

        let authors: Vec<Uuid> = submission
            .author_user_ids()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        sqlx::query(
            r#"
            INSERT INTO submission_authors (submission_id, user_id)
            SELECT $1, unnest($2::uuid[])
            "#,
        )
        .bind(submission.id)
        .bind(&authors)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn fetch_where_contains(&self, path: &str, user_id: Uuid) -> Result<Vec<Submission>> {
        let probe = json!([{ "user_id": user_id }]);
        let sql = format!(
            "SELECT * FROM submissions WHERE document -> {} @> $1 ORDER BY created_at DESC",
            path
        );
        let rows = sqlx::query_as::<_, SubmissionRow>(&sql)
            .bind(Json(probe))
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(rows.into_iter().map(SubmissionRow::into_submission).collect())
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn insert(&self, submission: &Submission) -> Result<i64> {
        let version = 1;
        let mut stored = submission.clone();
        stored.version = version;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO submissions (id, submission_number, status, version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(stored.id)
        .bind(&stored.submission_number)
        .bind(stored.status.as_str())
        .bind(version)
        .bind(Json(&stored))
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&mut *tx)
        .await?;
        Self::write_authors(&mut tx, &stored).await?;
        tx.commit().await?;

        Ok(version)
    }

    async fn load(&self, id: Uuid) -> Result<Submission> {
        sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(SubmissionRow::into_submission)
            .ok_or_else(|| Error::NotFound(format!("submission {}", id)))
    }

    async fn save(&self, submission: &Submission) -> Result<i64> {
        let expected = submission.version;
        let mut stored = submission.clone();
        stored.version = expected + 1;

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE submissions
            SET status = $3, version = $4, document = $5, updated_at = $6
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(stored.id)
        .bind(expected)
        .bind(stored.status.as_str())
        .bind(stored.version)
        .bind(Json(&stored))
        .bind(stored.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT version FROM submissions WHERE id = $1")
                    .bind(stored.id)
                    .fetch_optional(self.pool.as_ref())
                    .await?;
            return Err(match exists {
                Some(_) => Error::ConcurrentModification {
                    submission_id: stored.id,
                },
                None => Error::NotFound(format!("submission {}", stored.id)),
            });
        }

        Self::write_authors(&mut tx, &stored).await?;
        tx.commit().await?;
        Ok(stored.version)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Submission>> {
        self.fetch_where_contains("'associated_users'", user_id).await
    }

    async fn list_for_reviewer(&self, user_id: Uuid) -> Result<Vec<Submission>> {
        self.fetch_where_contains("'review_workflow' -> 'reviewers'", user_id)
            .await
    }

    async fn collaboration_counts(&self, user_id: Uuid) -> Result<HashMap<Uuid, u32>> {
        let rows = sqlx::query_as::<_, CollaboratorCount>(
            r#"
            SELECT other.user_id, COUNT(*) AS shared
            FROM submission_authors me
            JOIN submission_authors other
              ON other.submission_id = me.submission_id AND other.user_id <> me.user_id
            WHERE me.user_id = $1
            GROUP BY other.user_id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.user_id, r.shared as u32))
            .collect())
    }

    async fn append_notification(&self, entry: &NotificationLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_log (id, submission_id, kind, recipients, message, delivered, error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.submission_id)
        .bind(Json(entry.kind))
        .bind(&entry.recipients)
        .bind(&entry.message)
        .bind(entry.delivered)
        .bind(&entry.error)
        .bind(entry.created_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn notifications_for(&self, submission_id: Uuid) -> Result<Vec<NotificationLogEntry>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notification_log WHERE submission_id = $1 ORDER BY created_at",
        )
        .bind(submission_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(NotificationLogEntry::from).collect())
    }
}
