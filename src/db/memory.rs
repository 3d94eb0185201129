use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SubmissionStore;
use crate::error::{Error, Result};
use crate::notify::NotificationLogEntry;
use crate::submission::Submission;

#[derive(Default)]
struct Inner {
    submissions: HashMap<Uuid, Submission>,
    /// user id -> submissions the user is credited on
    authored: HashMap<Uuid, HashSet<Uuid>>,
    notifications: Vec<NotificationLogEntry>,
}

impl Inner {
    fn reindex(&mut self, submission: &Submission) {
        for submissions in self.authored.values_mut() {
            submissions.remove(&submission.id);
        }
        for user_id in submission.author_user_ids() {
            self.authored.entry(user_id).or_default().insert(submission.id);
        }
    }
}

/// Process-local store with the same optimistic-versioning contract as the
/// PostgreSQL store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, submission: &Submission) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let duplicate_number = inner
            .submissions
            .values()
            .any(|s| s.submission_number == submission.submission_number);
        if inner.submissions.contains_key(&submission.id) || duplicate_number {
            return Err(Error::Validation(format!(
                "submission {} already exists",
                submission.submission_number
            )));
        }

        let mut stored = submission.clone();
        stored.version = 1;
        inner.reindex(&stored);
        inner.submissions.insert(stored.id, stored);
        Ok(1)
    }

    async fn load(&self, id: Uuid) -> Result<Submission> {
        self.inner
            .read()
            .await
            .submissions
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("submission {}", id)))
    }

    async fn save(&self, submission: &Submission) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let current = inner
            .submissions
            .get(&submission.id)
            .ok_or_else(|| Error::NotFound(format!("submission {}", submission.id)))?;
        if current.version != submission.version {
            return Err(Error::ConcurrentModification {
                submission_id: submission.id,
            });
        }

        let mut stored = submission.clone();
        stored.version += 1;
        let version = stored.version;
        inner.reindex(&stored);
        inner.submissions.insert(stored.id, stored);
        Ok(version)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Submission>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|s| s.associated_user(user_id).is_some())
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_for_reviewer(&self, user_id: Uuid) -> Result<Vec<Submission>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|s| s.review_workflow.reviewers.iter().any(|r| r.user_id == user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn collaboration_counts(&self, user_id: Uuid) -> Result<HashMap<Uuid, u32>> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        let Some(submission_ids) = inner.authored.get(&user_id) else {
            return Ok(counts);
        };
        for submission_id in submission_ids {
            let Some(submission) = inner.submissions.get(submission_id) else {
                continue;
            };
            let others: HashSet<Uuid> = submission
                .author_user_ids()
                .filter(|id| *id != user_id)
                .collect();
            for other in others {
                *counts.entry(other).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn append_notification(&self, entry: &NotificationLogEntry) -> Result<()> {
        self.inner.write().await.notifications.push(entry.clone());
        Ok(())
    }

    async fn notifications_for(&self, submission_id: Uuid) -> Result<Vec<NotificationLogEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.submission_id == submission_id)
            .cloned()
            .collect())
    }
}
