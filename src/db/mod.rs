mod memory;
mod models;
mod postgres;

pub use memory::MemoryStore;
pub use models::*;
pub use postgres::PgSubmissionStore;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::notify::NotificationLogEntry;
use crate::submission::Submission;

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> std::result::Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Persistence for the Submission aggregate.
///
/// `save` is a compare-and-swap on `Submission::version`: it only writes when
/// the stored version still equals the one that was loaded, and fails with
/// `ConcurrentModification` otherwise.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Stores a new submission and returns its first version.
    async fn insert(&self, submission: &Submission) -> Result<i64>;

    async fn load(&self, id: Uuid) -> Result<Submission>;

    /// Writes the whole aggregate and returns the new version.
    async fn save(&self, submission: &Submission) -> Result<i64>;

    /// Submissions on which the user appears in `associated_users`.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Submission>>;

    /// Submissions holding any review assignment for the user.
    async fn list_for_reviewer(&self, user_id: Uuid) -> Result<Vec<Submission>>;

    /// Linked co-authors of `user_id` mapped to the number of submissions
    /// they share as corresponding author or co-author.
    async fn collaboration_counts(&self, user_id: Uuid) -> Result<HashMap<Uuid, u32>>;

    async fn append_notification(&self, entry: &NotificationLogEntry) -> Result<()>;

    async fn notifications_for(&self, submission_id: Uuid) -> Result<Vec<NotificationLogEntry>>;
}
