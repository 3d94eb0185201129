use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::review::{DecisionInput, ReviewerTask};
use crate::state::AppState;
use crate::submission::{Caller, EditorAssignment, FinalDecision, Review, ReviewerAssignment};

#[derive(Debug, Deserialize)]
pub struct AssignEditorRequest {
    pub user_id: Uuid,
    pub review_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AddReviewerRequest {
    pub user_id: Uuid,
}

pub async fn assign_editor(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignEditorRequest>,
) -> Result<Json<EditorAssignment>> {
    let assignment = state
        .engine
        .assign_editor(&caller, id, request.user_id, request.review_deadline)
        .await?;
    Ok(Json(assignment))
}

pub async fn add_reviewer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<AddReviewerRequest>,
) -> Result<(StatusCode, Json<ReviewerAssignment>)> {
    let assignment = state.engine.add_reviewer(&caller, id, request.user_id).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn accept(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewerAssignment>> {
    Ok(Json(state.engine.accept_review(&caller, id).await?))
}

pub async fn decline(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewerAssignment>> {
    Ok(Json(state.engine.decline_review(&caller, id).await?))
}

pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(review): Json<Review>,
) -> Result<Json<ReviewerAssignment>> {
    Ok(Json(state.engine.submit_review(&caller, id, review).await?))
}

pub async fn make_decision(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<DecisionInput>,
) -> Result<Json<FinalDecision>> {
    Ok(Json(state.engine.make_decision(&caller, id, input).await?))
}

pub async fn my_assignments(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<ReviewerTask>>> {
    Ok(Json(
        state.engine.get_submissions_for_reviewer(&caller).await?,
    ))
}
