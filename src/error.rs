//! Error types for the submission engine and its HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::submission::Operation;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Operation is not legal in the current state of the submission or assignment
    #[error("{operation} is not allowed while the {subject} is {state}")]
    InvalidStateTransition {
        operation: Operation,
        subject: &'static str,
        state: String,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate author: {0}")]
    DuplicateAuthor(String),

    #[error("Already invited: {0}")]
    AlreadyInvited(String),

    #[error("A response to this invitation has already been recorded")]
    AlreadyResponded,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid co-author order: {0}")]
    InvalidOrder(String),

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("Invitation expired at {deadline}")]
    InvitationExpired { deadline: DateTime<Utc> },

    #[error("The proceedings invitation has not been accepted")]
    InvitationNotAccepted,

    #[error("Ineligible sponsor: {0}")]
    IneligibleSponsor(String),

    #[error("Submission deadline passed at {deadline}")]
    DeadlinePassed { deadline: DateTime<Utc> },

    /// Persisted version moved since the read; the caller should retry
    #[error("Submission {submission_id} was modified concurrently")]
    ConcurrentModification { submission_id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External service error: {0}")]
    External(String),
}

impl Error {
    pub fn invalid_transition(operation: Operation, subject: &'static str, state: &str) -> Self {
        Error::InvalidStateTransition {
            operation,
            subject,
            state: state.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrentModification { .. })
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::InvalidStateTransition { .. } => {
                (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION")
            }
            Error::Unauthorized(_) => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::DuplicateAuthor(_) => (StatusCode::CONFLICT, "DUPLICATE_AUTHOR"),
            Error::AlreadyInvited(_) => (StatusCode::CONFLICT, "ALREADY_INVITED"),
            Error::AlreadyResponded => (StatusCode::CONFLICT, "ALREADY_RESPONDED"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::InvalidOrder(_) => (StatusCode::BAD_REQUEST, "INVALID_ORDER"),
            Error::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "INVALID_QUERY"),
            Error::InvitationExpired { .. } => (StatusCode::GONE, "INVITATION_EXPIRED"),
            Error::InvitationNotAccepted => (StatusCode::CONFLICT, "INVITATION_NOT_ACCEPTED"),
            Error::IneligibleSponsor(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INELIGIBLE_SPONSOR")
            }
            Error::DeadlinePassed { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "DEADLINE_PASSED"),
            Error::ConcurrentModification { .. } => {
                (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION")
            }
            Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Error::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Error::External(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_concurrent_modification_is_retryable() {
        let conflict = Error::ConcurrentModification {
            submission_id: Uuid::new_v4(),
        };
        assert!(conflict.is_retryable());
        assert!(!Error::AlreadyResponded.is_retryable());
        assert!(!Error::NotFound("submission".into()).is_retryable());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::invalid_transition(Operation::MakeDecision, "submission", "draft")
                .status_and_code()
                .0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Unauthorized("x".into()).status_and_code().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::InvitationExpired { deadline: Utc::now() }
                .status_and_code()
                .1,
            "INVITATION_EXPIRED"
        );
    }
}
