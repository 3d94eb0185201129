use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::read_paper;
use crate::authorship::{AvailabilityInput, CoAuthorInput, PresenterInput, SponsorInput};
use crate::collaboration::{CandidatePage, SearchParams};
use crate::error::{Error, Result};
use crate::notify::NotificationLogEntry;
use crate::state::AppState;
use crate::storage::DocumentRef;
use crate::submission::{
    Author, Caller, NewSubmission, NotificationPreferences, PresenterAvailability, Sponsor,
    Submission,
};

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub order: Vec<Uuid>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(data): Json<NewSubmission>,
) -> Result<(StatusCode, Json<Submission>)> {
    let submission = state.engine.create_submission(&caller, data).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<Submission>>> {
    Ok(Json(state.engine.get_my_submissions(&caller).await?))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>> {
    Ok(Json(state.engine.get_submission(&caller, id).await?))
}

pub async fn upload_paper(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentRef>)> {
    let upload = read_paper(multipart)
        .await?
        .ok_or_else(|| Error::Validation("multipart field 'paper' is required".to_string()))?;
    let paper = state.engine.upload_paper(&caller, id, upload).await?;
    Ok((StatusCode::CREATED, Json(paper)))
}

pub async fn submit_for_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>> {
    Ok(Json(state.engine.submit_for_review(&caller, id).await?))
}

pub async fn submit_revision(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>> {
    Ok(Json(state.engine.submit_revision(&caller, id).await?))
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>> {
    Ok(Json(state.engine.withdraw_submission(&caller, id).await?))
}

pub async fn add_co_author(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<CoAuthorInput>,
) -> Result<(StatusCode, Json<Author>)> {
    let author = state.engine.add_co_author(&caller, id, input).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

pub async fn remove_co_author(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((id, author_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Author>> {
    Ok(Json(
        state.engine.remove_co_author(&caller, id, author_id).await?,
    ))
}

pub async fn reorder_co_authors(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<Author>>> {
    Ok(Json(
        state
            .engine
            .reorder_co_authors(&caller, id, &request.order)
            .await?,
    ))
}

pub async fn add_sponsor(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<SponsorInput>,
) -> Result<(StatusCode, Json<Sponsor>)> {
    let sponsor = state.engine.add_faculty_sponsor(&caller, id, input).await?;
    Ok((StatusCode::CREATED, Json(sponsor)))
}

pub async fn remove_sponsor(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((id, sponsor_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Sponsor>> {
    Ok(Json(
        state
            .engine
            .remove_faculty_sponsor(&caller, id, sponsor_id)
            .await?,
    ))
}

pub async fn designate_presenter(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<PresenterInput>,
) -> Result<Json<Author>> {
    Ok(Json(
        state.engine.designate_presenter(&caller, id, input).await?,
    ))
}

pub async fn remove_presenter(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((id, author_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Author>> {
    Ok(Json(
        state.engine.remove_presenter(&caller, id, author_id).await?,
    ))
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<PresenterAvailability>>> {
    Ok(Json(
        state.engine.get_presenter_availability(&caller, id).await?,
    ))
}

pub async fn update_availability(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<AvailabilityInput>,
) -> Result<Json<PresenterAvailability>> {
    Ok(Json(
        state
            .engine
            .update_presenter_availability(&caller, id, input)
            .await?,
    ))
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationPreferences>> {
    Ok(Json(
        state
            .engine
            .get_notification_preferences(&caller, id)
            .await?,
    ))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(preferences): Json<NotificationPreferences>,
) -> Result<Json<NotificationPreferences>> {
    Ok(Json(
        state
            .engine
            .update_notification_preferences(&caller, id, preferences)
            .await?,
    ))
}

pub async fn notification_log(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<NotificationLogEntry>>> {
    Ok(Json(state.engine.get_notification_log(&caller, id).await?))
}

pub async fn search_co_authors(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(params): Query<SearchParams>,
) -> Result<Json<CandidatePage>> {
    Ok(Json(
        state
            .engine
            .search_potential_co_authors(&caller, params)
            .await?,
    ))
}
