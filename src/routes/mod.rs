//! JSON API over the engine.
//!
//! Identity is asserted by the authentication gateway in front of this
//! service: `X-User-Id` carries the caller's user id and `X-User-Role: admin`
//! grants the administrator override.

mod proceedings;
mod reviews;
mod submissions;

use axum::{
    async_trait,
    extract::{FromRequestParts, Multipart},
    http::request::Parts,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::storage::DocumentUpload;
use crate::submission::Caller;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| Error::Unauthorized("missing or invalid X-User-Id header".to_string()))?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |role| role.trim().eq_ignore_ascii_case("admin"));

        Ok(Caller { user_id, is_admin })
    }
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/submissions",
            get(submissions::list_mine).post(submissions::create),
        )
        .route("/submissions/:id", get(submissions::detail))
        .route("/submissions/:id/paper", post(submissions::upload_paper))
        .route("/submissions/:id/submit", post(submissions::submit_for_review))
        .route("/submissions/:id/revision", post(submissions::submit_revision))
        .route("/submissions/:id/withdraw", post(submissions::withdraw))
        .route("/submissions/:id/co-authors", post(submissions::add_co_author))
        .route(
            "/submissions/:id/co-authors/order",
            put(submissions::reorder_co_authors),
        )
        .route(
            "/submissions/:id/co-authors/:author_id",
            delete(submissions::remove_co_author),
        )
        .route("/submissions/:id/sponsors", post(submissions::add_sponsor))
        .route(
            "/submissions/:id/sponsors/:sponsor_id",
            delete(submissions::remove_sponsor),
        )
        .route(
            "/submissions/:id/presenters",
            post(submissions::designate_presenter),
        )
        .route(
            "/submissions/:id/presenters/:author_id",
            delete(submissions::remove_presenter),
        )
        .route(
            "/submissions/:id/availability",
            get(submissions::get_availability).put(submissions::update_availability),
        )
        .route(
            "/submissions/:id/notification-preferences",
            get(submissions::get_preferences).put(submissions::update_preferences),
        )
        .route(
            "/submissions/:id/notifications",
            get(submissions::notification_log),
        )
        .route("/co-authors/search", get(submissions::search_co_authors))
        .route("/submissions/:id/editor", post(reviews::assign_editor))
        .route("/submissions/:id/reviewers", post(reviews::add_reviewer))
        .route("/submissions/:id/review", post(reviews::submit_review))
        .route("/submissions/:id/review/accept", post(reviews::accept))
        .route("/submissions/:id/review/decline", post(reviews::decline))
        .route("/submissions/:id/decision", post(reviews::make_decision))
        .route("/reviews", get(reviews::my_assignments))
        .route("/submissions/:id/presented", post(proceedings::mark_presented))
        .route(
            "/submissions/:id/proceedings/invite",
            post(proceedings::invite),
        )
        .route(
            "/submissions/:id/proceedings/response",
            post(proceedings::respond),
        )
        .route(
            "/submissions/:id/proceedings/paper",
            post(proceedings::submit_paper),
        )
        .route(
            "/submissions/:id/proceedings/editor",
            post(proceedings::assign_editor),
        )
        .route(
            "/submissions/:id/proceedings/decision",
            post(proceedings::make_decision),
        )
        .route(
            "/submissions/:id/proceedings/revision",
            post(proceedings::submit_revision),
        )
        .route(
            "/submissions/:id/proceedings/resume",
            post(proceedings::resume_review),
        )
        .route(
            "/submissions/:id/proceedings/publish",
            post(proceedings::publish),
        )
        .route("/proceedings", get(proceedings::list_mine))
}

/// Pulls the `paper` field out of a multipart upload. Only PDFs are accepted.
pub(crate) async fn read_paper(mut multipart: Multipart) -> Result<Option<DocumentUpload>> {
    let mut paper = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("malformed upload: {}", e)))?
    {
        if field.name() != Some("paper") {
            continue;
        }
        let filename = field.file_name().unwrap_or("paper.pdf").to_string();
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(Error::Validation(format!(
                "'{}' is not a PDF file",
                filename
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::Validation(format!("malformed upload: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::Validation("uploaded paper is empty".to_string()));
        }
        paper = Some(DocumentUpload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Ok(paper)
}
