//! Notification events and delivery to the external Notification Service.
//!
//! Delivery is best effort: the engine logs the event locally and hands it to
//! a `Notifier`, but a failed dispatch never undoes the transition behind it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::submission::{AssociatedUser, Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SubmissionReceived,
    ReviewerInvited,
    ReviewCompleted,
    DecisionMade,
    RevisionSubmitted,
    EditorAssigned,
    ProceedingsInvited,
    ProceedingsResponse,
    ProceedingsSubmitted,
    Published,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SubmissionReceived => "submission_received",
            NotificationKind::ReviewerInvited => "reviewer_invited",
            NotificationKind::ReviewCompleted => "review_completed",
            NotificationKind::DecisionMade => "decision_made",
            NotificationKind::RevisionSubmitted => "revision_submitted",
            NotificationKind::EditorAssigned => "editor_assigned",
            NotificationKind::ProceedingsInvited => "proceedings_invited",
            NotificationKind::ProceedingsResponse => "proceedings_response",
            NotificationKind::ProceedingsSubmitted => "proceedings_submitted",
            NotificationKind::Published => "published",
        }
    }
}

/// One delivery target with the channels that user has enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: Uuid,
    pub email: bool,
    pub sms: bool,
    pub in_app: bool,
}

impl From<AssociatedUser> for Recipient {
    fn from(user: AssociatedUser) -> Self {
        Recipient {
            user_id: user.user_id,
            email: user.preferences.email,
            sms: user.preferences.sms,
            in_app: user.preferences.in_app,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub submission_id: Uuid,
    pub submission_number: String,
    pub title: String,
    pub recipients: Vec<Recipient>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        kind: NotificationKind,
        submission: &Submission,
        recipients: Vec<AssociatedUser>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            submission_id: submission.id,
            submission_number: submission.submission_number.clone(),
            title: submission.title.clone(),
            recipients: recipients.into_iter().map(Recipient::from).collect(),
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Local audit record of an emitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLogEntry {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub kind: NotificationKind,
    pub recipients: Vec<Uuid>,
    pub message: String,
    pub delivered: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationLogEntry {
    pub fn from_event(event: &NotificationEvent, outcome: &Result<()>) -> Self {
        Self {
            id: event.id,
            submission_id: event.submission_id,
            kind: event.kind,
            recipients: event.recipients.iter().map(|r| r.user_id).collect(),
            message: event.message.clone(),
            delivered: outcome.is_ok(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
            created_at: event.occurred_at,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, event: &NotificationEvent) -> Result<()>;
}

/// Posts each event as JSON to the notification service's webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::External(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn dispatch(&self, event: &NotificationEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| Error::External(format!("notification request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::External(format!(
                "notification service returned {}",
                status
            )));
        }
        Ok(())
    }
}

/// Used when no notification service is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, event: &NotificationEvent) -> Result<()> {
        info!(
            submission_id = %event.submission_id,
            kind = event.kind.as_str(),
            recipients = event.recipients.len(),
            "{}",
            event.message
        );
        Ok(())
    }
}
