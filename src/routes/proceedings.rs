use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::read_paper;
use crate::error::Result;
use crate::proceedings::{
    InvitationResponseInput, ProceedingsDecisionInput, ProceedingsSummary, PublicationInput,
};
use crate::state::AppState;
use crate::submission::{AuthorResponse, Caller, ProceedingsDecision, Publication, Submission};

#[derive(Debug, Default, Deserialize)]
pub struct InviteRequest {
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignEditorRequest {
    pub user_id: Uuid,
}

pub async fn mark_presented(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>> {
    Ok(Json(state.engine.mark_presented(&caller, id).await?))
}

pub async fn invite(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<InviteRequest>,
) -> Result<Json<Submission>> {
    Ok(Json(
        state
            .engine
            .invite_to_proceedings(&caller, id, request.deadline)
            .await?,
    ))
}

pub async fn respond(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<InvitationResponseInput>,
) -> Result<Json<AuthorResponse>> {
    Ok(Json(
        state.engine.respond_to_invitation(&caller, id, input).await?,
    ))
}

pub async fn submit_paper(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Submission>> {
    let upload = read_paper(multipart).await?;
    Ok(Json(
        state
            .engine
            .submit_proceedings_paper(&caller, id, upload)
            .await?,
    ))
}

pub async fn assign_editor(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignEditorRequest>,
) -> Result<Json<Submission>> {
    Ok(Json(
        state
            .engine
            .assign_proceedings_editor(&caller, id, request.user_id)
            .await?,
    ))
}

pub async fn make_decision(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<ProceedingsDecisionInput>,
) -> Result<Json<ProceedingsDecision>> {
    Ok(Json(
        state
            .engine
            .make_proceedings_decision(&caller, id, input)
            .await?,
    ))
}

pub async fn submit_revision(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Submission>> {
    let upload = read_paper(multipart).await?;
    Ok(Json(
        state
            .engine
            .submit_proceedings_revision(&caller, id, upload)
            .await?,
    ))
}

pub async fn resume_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>> {
    Ok(Json(
        state.engine.resume_proceedings_review(&caller, id).await?,
    ))
}

pub async fn publish(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<PublicationInput>,
) -> Result<Json<Publication>> {
    Ok(Json(
        state.engine.publish_proceedings(&caller, id, input).await?,
    ))
}

pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<ProceedingsSummary>>> {
    Ok(Json(state.engine.get_my_proceedings(&caller).await?))
}
