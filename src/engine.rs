//! Orchestration of the submission lifecycle.
//!
//! Every mutating operation is one read-modify-write: load the aggregate,
//! let a component function mutate the loaded copy, then save it under the
//! version it was loaded with. A failing component returns before the save,
//! so nothing is persisted. Notifications go out after the write commits.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::authorship::{self, AvailabilityInput, CoAuthorInput, PresenterInput, SponsorInput};
use crate::collaboration::{self, CandidatePage, SearchParams};
use crate::db::SubmissionStore;
use crate::directory::{ConferenceRegistry, User, UserDirectory};
use crate::error::{Error, Result};
use crate::notify::{NotificationEvent, NotificationKind, NotificationLogEntry, Notifier};
use crate::proceedings::{
    self, InvitationResponseInput, ProceedingsDecisionInput, ProceedingsSummary, PublicationInput,
};
use crate::review::{self, DecisionInput, ReviewerTask};
use crate::storage::{generate_submission_number, DocumentRef, DocumentStore, DocumentUpload};
use crate::submission::{
    AssociatedUser, Author, AuthorIdentity, AuthorResponse, AuthorRole, Caller, EditorAssignment,
    FinalDecision, NewSubmission, NotificationPreferences, Operation, PresenterAvailability,
    ProceedingsDecision, Publication, Relationship, Review, ReviewerAssignment, Sponsor,
    Submission,
};

const AUTHORS: &[Relationship] = &[Relationship::CorrespondingAuthor, Relationship::CoAuthor];

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// How often a reviewer-slot write is retried after losing a version race
    pub slot_retries: u32,
    pub search_max_limit: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slot_retries: 5,
            search_max_limit: 50,
        }
    }
}

pub struct Engine {
    store: Arc<dyn SubmissionStore>,
    directory: Arc<dyn UserDirectory>,
    conferences: Arc<dyn ConferenceRegistry>,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        directory: Arc<dyn UserDirectory>,
        conferences: Arc<dyn ConferenceRegistry>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            directory,
            conferences,
            documents,
            notifier,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    // ---- plumbing ----

    /// Applies `mutate` to an already loaded aggregate and saves it under the
    /// version it was loaded with.
    async fn apply<T, F>(&self, op: Operation, mut submission: Submission, mutate: F) -> Result<(Submission, T)>
    where
        F: FnOnce(&mut Submission) -> Result<T>,
    {
        let before = submission.status;
        let output = mutate(&mut submission)?;
        submission.check_invariants()?;
        submission.updated_at = Utc::now();
        submission.version = self.store.save(&submission).await?;

        if submission.status != before {
            info!(
                submission_id = %submission.id,
                operation = op.as_str(),
                from = before.as_str(),
                status = submission.status.as_str(),
                "Submission status changed"
            );
        } else {
            debug!(
                submission_id = %submission.id,
                operation = op.as_str(),
                version = submission.version,
                "Submission updated"
            );
        }
        Ok((submission, output))
    }

    async fn commit<T, F>(&self, op: Operation, id: Uuid, mutate: F) -> Result<(Submission, T)>
    where
        F: FnOnce(&mut Submission) -> Result<T>,
    {
        let submission = self.store.load(id).await?;
        self.apply(op, submission, mutate).await
    }

    /// For writes that touch only their own slot (a reviewer assignment, an
    /// uploaded paper): a lost version race is replayed against a fresh copy
    /// instead of surfacing to the caller.
    async fn commit_slot<T, F>(&self, op: Operation, id: Uuid, mut mutate: F) -> Result<(Submission, T)>
    where
        F: FnMut(&mut Submission) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match self.commit(op, id, &mut mutate).await {
                Err(e) if e.is_retryable() && attempt < self.settings.slot_retries => {
                    attempt += 1;
                    warn!(
                        submission_id = %id,
                        operation = op.as_str(),
                        attempt,
                        "Version conflict on slot write, retrying"
                    );
                }
                outcome => return outcome,
            }
        }
    }

    /// Saves a write that references a document already in the document
    /// store, replaying it on a version conflict so the file stays referenced.
    async fn apply_stored<T, F>(&self, op: Operation, submission: Submission, mut mutate: F) -> Result<(Submission, T)>
    where
        F: FnMut(&mut Submission) -> Result<T>,
    {
        let id = submission.id;
        match self.apply(op, submission, &mut mutate).await {
            Err(e) if e.is_retryable() => {
                warn!(
                    submission_id = %id,
                    operation = op.as_str(),
                    "Version conflict after storing a document, retrying"
                );
                self.commit_slot(op, id, mutate).await
            }
            outcome => outcome,
        }
    }

    /// Records the event locally and hands it to the notification service.
    /// Neither step can fail the operation that triggered it.
    async fn emit(
        &self,
        kind: NotificationKind,
        submission: &Submission,
        recipients: Vec<AssociatedUser>,
        message: String,
    ) {
        let event = NotificationEvent::new(kind, submission, recipients, message);
        let outcome = self.notifier.dispatch(&event).await;
        if let Err(e) = &outcome {
            warn!(
                submission_id = %submission.id,
                kind = kind.as_str(),
                "Notification delivery failed: {}",
                e
            );
        }

        let entry = NotificationLogEntry::from_event(&event, &outcome);
        if let Err(e) = self.store.append_notification(&entry).await {
            warn!(
                submission_id = %submission.id,
                kind = kind.as_str(),
                "Failed to record notification: {}",
                e
            );
        }
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User> {
        self.directory
            .user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    // ---- submission ----

    pub async fn create_submission(&self, caller: &Caller, data: NewSubmission) -> Result<Submission> {
        if data.title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        let conference = self
            .conferences
            .conference(data.conference_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conference {}", data.conference_id)))?;
        if Utc::now() > conference.submission_deadline {
            return Err(Error::DeadlinePassed {
                deadline: conference.submission_deadline,
            });
        }

        let profile = self.require_user(caller.user_id).await?;
        let is_student = data.academic_level.is_student();
        let role = if is_student {
            AuthorRole::StudentResearcher
        } else {
            AuthorRole::CoAuthor
        };
        let mut corresponding = Author::new(
            AuthorIdentity::Linked {
                user_id: profile.id,
                name: profile.name,
                email: profile.email,
                affiliation: profile.organization,
            },
            role,
            0,
        );
        corresponding.is_student_author = is_student;

        let number = generate_submission_number(conference.year);
        let mut submission = Submission::new(data, number, conference.year, corresponding);
        submission.version = self.store.insert(&submission).await?;

        info!(
            submission_id = %submission.id,
            submission_number = %submission.submission_number,
            status = submission.status.as_str(),
            "Submission created"
        );
        Ok(submission)
    }

    pub async fn upload_paper(
        &self,
        caller: &Caller,
        id: Uuid,
        upload: DocumentUpload,
    ) -> Result<DocumentRef> {
        let submission = self.store.load(id).await?;
        // Refuse before the bytes reach the document store.
        Operation::UploadPaper.ensure_allowed(submission.status)?;
        submission.ensure_corresponding_author_or_admin(caller)?;

        let paper = self.documents.store(upload).await?;
        self.apply_stored(Operation::UploadPaper, submission, |s| {
            review::upload_paper(s, caller, paper.clone())
        })
        .await?;
        Ok(paper)
    }

    pub async fn submit_for_review(&self, caller: &Caller, id: Uuid) -> Result<Submission> {
        let (submission, ()) = self
            .commit(Operation::SubmitForReview, id, |s| {
                review::submit_for_review(s, caller)
            })
            .await?;

        self.emit(
            NotificationKind::SubmissionReceived,
            &submission,
            submission.recipients(AUTHORS),
            format!("Submission {} was received for review", submission.submission_number),
        )
        .await;
        Ok(submission.view_for(caller))
    }

    pub async fn submit_revision(&self, caller: &Caller, id: Uuid) -> Result<Submission> {
        let (submission, cycle) = self
            .commit(Operation::SubmitRevision, id, |s| {
                review::submit_revision(s, caller)
            })
            .await?;

        self.emit(
            NotificationKind::RevisionSubmitted,
            &submission,
            submission.recipients(&[
                Relationship::CorrespondingAuthor,
                Relationship::CoAuthor,
                Relationship::Editor,
            ]),
            format!(
                "A revised paper for {} opened review cycle {}",
                submission.submission_number, cycle
            ),
        )
        .await;
        Ok(submission.view_for(caller))
    }

    pub async fn withdraw_submission(&self, caller: &Caller, id: Uuid) -> Result<Submission> {
        let (submission, ()) = self
            .commit(Operation::Withdraw, id, |s| review::withdraw(s, caller))
            .await?;
        Ok(submission.view_for(caller))
    }

    pub async fn get_my_submissions(&self, caller: &Caller) -> Result<Vec<Submission>> {
        Ok(self
            .store
            .list_for_user(caller.user_id)
            .await?
            .into_iter()
            .map(|s| s.view_for(caller))
            .collect())
    }

    pub async fn get_submission(&self, caller: &Caller, id: Uuid) -> Result<Submission> {
        let submission = self.store.load(id).await?;
        submission.ensure_associated_or_admin(caller)?;
        Ok(submission.view_for(caller))
    }

    pub async fn get_notification_log(
        &self,
        caller: &Caller,
        id: Uuid,
    ) -> Result<Vec<NotificationLogEntry>> {
        let submission = self.store.load(id).await?;
        submission.ensure_associated_or_admin(caller)?;
        let entries = self.store.notifications_for(id).await?;
        if submission.is_review_team(caller) {
            return Ok(entries);
        }
        // Reviewer invitations would reveal who reviews the paper.
        Ok(entries
            .into_iter()
            .filter(|e| e.recipients.contains(&caller.user_id))
            .collect())
    }

    pub async fn get_notification_preferences(
        &self,
        caller: &Caller,
        id: Uuid,
    ) -> Result<NotificationPreferences> {
        let submission = self.store.load(id).await?;
        submission
            .associated_user(caller.user_id)
            .map(|u| u.preferences)
            .ok_or_else(|| {
                Error::Unauthorized("caller has no relationship to this submission".to_string())
            })
    }

    pub async fn update_notification_preferences(
        &self,
        caller: &Caller,
        id: Uuid,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        self.commit(Operation::UpdateNotificationPreferences, id, |s| {
            Operation::UpdateNotificationPreferences.ensure_allowed(s.status)?;
            s.set_preferences(caller.user_id, preferences)
        })
        .await?;
        Ok(preferences)
    }

    // ---- authorship ----

    pub async fn add_co_author(
        &self,
        caller: &Caller,
        id: Uuid,
        input: CoAuthorInput,
    ) -> Result<Author> {
        let linked = match input.user_id {
            Some(user_id) => self.directory.user(user_id).await?,
            None => None,
        };
        let identity = authorship::resolve_identity(
            input.user_id,
            linked.as_ref(),
            input.name.as_deref(),
            input.institution.as_deref(),
            input.email.as_deref(),
        )?;

        let submission = self.store.load(id).await?;
        let is_known = match (submission.corresponding_author.user_id(), identity.user_id()) {
            (Some(owner), Some(new_author)) => self
                .store
                .collaboration_counts(owner)
                .await?
                .get(&new_author)
                .map_or(false, |shared| *shared > 0),
            _ => false,
        };

        let (_, author) = self
            .apply(Operation::AddCoAuthor, submission, |s| {
                authorship::add_co_author(
                    s,
                    caller,
                    identity,
                    input.role,
                    input.is_student_author,
                    is_known,
                )
            })
            .await?;
        Ok(author)
    }

    pub async fn remove_co_author(&self, caller: &Caller, id: Uuid, author_id: Uuid) -> Result<Author> {
        let (_, removed) = self
            .commit(Operation::RemoveCoAuthor, id, |s| {
                authorship::remove_co_author(s, caller, author_id)
            })
            .await?;
        Ok(removed)
    }

    pub async fn reorder_co_authors(
        &self,
        caller: &Caller,
        id: Uuid,
        new_order: &[Uuid],
    ) -> Result<Vec<Author>> {
        let (submission, ()) = self
            .commit(Operation::ReorderCoAuthors, id, |s| {
                authorship::reorder_co_authors(s, caller, new_order)
            })
            .await?;
        Ok(submission.co_authors)
    }

    pub async fn add_faculty_sponsor(
        &self,
        caller: &Caller,
        id: Uuid,
        input: SponsorInput,
    ) -> Result<Sponsor> {
        let linked = match input.user_id {
            Some(user_id) => self.directory.user(user_id).await?,
            None => None,
        };
        let identity = authorship::resolve_identity(
            input.user_id,
            linked.as_ref(),
            input.name.as_deref(),
            input.institution.as_deref(),
            input.email.as_deref(),
        )?;

        let (_, sponsor) = self
            .commit(Operation::AddFacultySponsor, id, |s| {
                authorship::add_faculty_sponsor(
                    s,
                    caller,
                    identity,
                    linked.as_ref(),
                    input.department,
                    input.role,
                )
            })
            .await?;
        Ok(sponsor)
    }

    pub async fn remove_faculty_sponsor(
        &self,
        caller: &Caller,
        id: Uuid,
        sponsor_id: Uuid,
    ) -> Result<Sponsor> {
        let (_, removed) = self
            .commit(Operation::RemoveFacultySponsor, id, |s| {
                authorship::remove_faculty_sponsor(s, caller, sponsor_id)
            })
            .await?;
        Ok(removed)
    }

    pub async fn designate_presenter(
        &self,
        caller: &Caller,
        id: Uuid,
        input: PresenterInput,
    ) -> Result<Author> {
        let (_, presenter) = self
            .commit(Operation::DesignatePresenter, id, |s| {
                authorship::designate_presenter(s, caller, &input)
            })
            .await?;
        Ok(presenter)
    }

    pub async fn remove_presenter(&self, caller: &Caller, id: Uuid, author_id: Uuid) -> Result<Author> {
        let (_, author) = self
            .commit(Operation::RemovePresenter, id, |s| {
                authorship::remove_presenter(s, caller, author_id)
            })
            .await?;
        Ok(author)
    }

    pub async fn update_presenter_availability(
        &self,
        caller: &Caller,
        id: Uuid,
        input: AvailabilityInput,
    ) -> Result<PresenterAvailability> {
        let (_, availability) = self
            .commit(Operation::UpdateAvailability, id, |s| {
                authorship::update_availability(s, caller, input)
            })
            .await?;
        Ok(availability)
    }

    pub async fn get_presenter_availability(
        &self,
        caller: &Caller,
        id: Uuid,
    ) -> Result<Option<PresenterAvailability>> {
        let submission = self.store.load(id).await?;
        submission.ensure_author_or_admin(caller)?;
        Ok(submission.presentation_details.availability)
    }

    pub async fn search_potential_co_authors(
        &self,
        caller: &Caller,
        params: SearchParams,
    ) -> Result<CandidatePage> {
        let query = collaboration::validate_query(&params.query)?;
        let matches = self.directory.search(query).await?;
        let counts = self.store.collaboration_counts(caller.user_id).await?;
        let credited: Option<HashSet<Uuid>> = match params.exclude_submission {
            Some(id) => {
                let excluded = self.store.load(id).await?;
                excluded.ensure_associated_or_admin(caller)?;
                Some(excluded.author_user_ids().collect())
            }
            None => None,
        };

        Ok(collaboration::search(
            matches,
            caller.user_id,
            &counts,
            credited.as_ref(),
            params.page,
            params.limit,
            self.settings.search_max_limit,
        ))
    }

    // ---- review ----

    pub async fn assign_editor(
        &self,
        caller: &Caller,
        id: Uuid,
        editor_id: Uuid,
        review_deadline: Option<DateTime<Utc>>,
    ) -> Result<EditorAssignment> {
        let editor = self.require_user(editor_id).await?;
        let (submission, previous) = self
            .commit(Operation::AssignEditor, id, |s| {
                review::assign_editor(s, caller, &editor, review_deadline)
            })
            .await?;
        if let Some(previous) = previous {
            info!(
                submission_id = %submission.id,
                previous_editor = %previous.user_id,
                editor = %editor.id,
                "Editor replaced"
            );
        }

        self.emit(
            NotificationKind::EditorAssigned,
            &submission,
            submission.recipients(&[Relationship::Editor]),
            format!(
                "You were assigned as editor of {}",
                submission.submission_number
            ),
        )
        .await;

        submission
            .review_workflow
            .editor
            .ok_or_else(|| Error::NotFound("editor assignment".to_string()))
    }

    pub async fn add_reviewer(
        &self,
        caller: &Caller,
        id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<ReviewerAssignment> {
        let reviewer = self.require_user(reviewer_id).await?;
        let (submission, assignment) = self
            .commit_slot(Operation::AddReviewer, id, |s| {
                review::add_reviewer(s, caller, &reviewer)
            })
            .await?;

        self.emit(
            NotificationKind::ReviewerInvited,
            &submission,
            single_recipient(&submission, reviewer_id),
            format!(
                "You are invited to review {} ({})",
                submission.submission_number, submission.title
            ),
        )
        .await;
        Ok(assignment)
    }

    pub async fn accept_review(&self, caller: &Caller, id: Uuid) -> Result<ReviewerAssignment> {
        let (_, assignment) = self
            .commit_slot(Operation::AcceptReview, id, |s| {
                review::respond_to_review(s, caller.user_id, true)
            })
            .await?;
        Ok(assignment)
    }

    pub async fn decline_review(&self, caller: &Caller, id: Uuid) -> Result<ReviewerAssignment> {
        let (_, assignment) = self
            .commit_slot(Operation::DeclineReview, id, |s| {
                review::respond_to_review(s, caller.user_id, false)
            })
            .await?;
        Ok(assignment)
    }

    pub async fn submit_review(
        &self,
        caller: &Caller,
        id: Uuid,
        report: Review,
    ) -> Result<ReviewerAssignment> {
        review::validate_review(&report)?;
        let (submission, assignment) = self
            .commit_slot(Operation::SubmitReview, id, |s| {
                review::submit_review(s, caller.user_id, report.clone())
            })
            .await?;

        let completed = submission
            .review_workflow
            .current_cycle_reviewers()
            .filter(|r| r.review.is_some())
            .count();
        self.emit(
            NotificationKind::ReviewCompleted,
            &submission,
            submission.recipients(&[Relationship::Editor]),
            format!(
                "A review of {} was completed ({} so far this cycle)",
                submission.submission_number, completed
            ),
        )
        .await;
        Ok(assignment)
    }

    pub async fn make_decision(
        &self,
        caller: &Caller,
        id: Uuid,
        input: DecisionInput,
    ) -> Result<FinalDecision> {
        let (submission, decision) = self
            .commit(Operation::MakeDecision, id, |s| {
                review::make_decision(s, caller, input)
            })
            .await?;

        self.emit(
            NotificationKind::DecisionMade,
            &submission,
            submission.recipients(AUTHORS),
            format!(
                "Decision on {}: {}",
                submission.submission_number,
                decision.decision.as_str()
            ),
        )
        .await;
        Ok(decision)
    }

    pub async fn get_submissions_for_reviewer(&self, caller: &Caller) -> Result<Vec<ReviewerTask>> {
        Ok(self
            .store
            .list_for_reviewer(caller.user_id)
            .await?
            .iter()
            .filter_map(|s| review::reviewer_task(s, caller.user_id))
            .collect())
    }

    // ---- proceedings ----

    pub async fn mark_presented(&self, caller: &Caller, id: Uuid) -> Result<Submission> {
        let (submission, ()) = self
            .commit(Operation::MarkPresented, id, |s| {
                proceedings::mark_presented(s, caller)
            })
            .await?;
        Ok(submission.view_for(caller))
    }

    pub async fn invite_to_proceedings(
        &self,
        caller: &Caller,
        id: Uuid,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Submission> {
        let (submission, ()) = self
            .commit(Operation::InviteToProceedings, id, |s| {
                proceedings::invite(s, caller, deadline)
            })
            .await?;

        let message = match deadline {
            Some(deadline) => format!(
                "{} is invited to the proceedings; please respond by {}",
                submission.submission_number,
                deadline.format("%Y-%m-%d")
            ),
            None => format!("{} is invited to the proceedings", submission.submission_number),
        };
        self.emit(
            NotificationKind::ProceedingsInvited,
            &submission,
            submission.recipients(AUTHORS),
            message,
        )
        .await;
        Ok(submission.view_for(caller))
    }

    pub async fn respond_to_invitation(
        &self,
        caller: &Caller,
        id: Uuid,
        input: InvitationResponseInput,
    ) -> Result<AuthorResponse> {
        let now = Utc::now();
        let (submission, response) = self
            .commit(Operation::RespondToInvitation, id, |s| {
                proceedings::respond(s, caller, input, now)
            })
            .await?;

        let answer = if response.accepted_invitation {
            "accepted"
        } else {
            "declined"
        };
        self.emit(
            NotificationKind::ProceedingsResponse,
            &submission,
            submission.recipients(AUTHORS),
            format!(
                "The proceedings invitation for {} was {}",
                submission.submission_number, answer
            ),
        )
        .await;
        Ok(response)
    }

    pub async fn submit_proceedings_paper(
        &self,
        caller: &Caller,
        id: Uuid,
        upload: Option<DocumentUpload>,
    ) -> Result<Submission> {
        let submission = self.store.load(id).await?;
        Operation::SubmitProceedingsPaper.ensure_allowed(submission.status)?;
        let accepted = submission
            .proceedings
            .as_ref()
            .and_then(|p| p.author_response.as_ref())
            .map_or(false, |r| r.accepted_invitation);
        let paper = match upload {
            Some(upload) if accepted && submission.is_author(caller.user_id) => {
                Some(self.documents.store(upload).await?)
            }
            _ => None,
        };

        let (submission, ()) = self
            .apply_stored(Operation::SubmitProceedingsPaper, submission, |s| {
                proceedings::submit_paper(s, caller, paper.clone())
            })
            .await?;

        self.emit(
            NotificationKind::ProceedingsSubmitted,
            &submission,
            submission.recipients(AUTHORS),
            format!(
                "The proceedings paper for {} was submitted",
                submission.submission_number
            ),
        )
        .await;
        Ok(submission.view_for(caller))
    }

    pub async fn assign_proceedings_editor(
        &self,
        caller: &Caller,
        id: Uuid,
        editor_id: Uuid,
    ) -> Result<Submission> {
        let editor = self.require_user(editor_id).await?;
        let (submission, ()) = self
            .commit(Operation::AssignProceedingsEditor, id, |s| {
                proceedings::assign_editor(s, caller, &editor)
            })
            .await?;

        self.emit(
            NotificationKind::EditorAssigned,
            &submission,
            submission.recipients(&[Relationship::ProceedingsEditor]),
            format!(
                "You were assigned as proceedings editor of {}",
                submission.submission_number
            ),
        )
        .await;
        Ok(submission.view_for(caller))
    }

    pub async fn make_proceedings_decision(
        &self,
        caller: &Caller,
        id: Uuid,
        input: ProceedingsDecisionInput,
    ) -> Result<ProceedingsDecision> {
        let (submission, decision) = self
            .commit(Operation::MakeProceedingsDecision, id, |s| {
                proceedings::make_decision(s, caller, input)
            })
            .await?;

        self.emit(
            NotificationKind::DecisionMade,
            &submission,
            submission.recipients(AUTHORS),
            format!(
                "Proceedings decision on {}: {}",
                submission.submission_number,
                decision.decision.as_str()
            ),
        )
        .await;
        Ok(decision)
    }

    pub async fn submit_proceedings_revision(
        &self,
        caller: &Caller,
        id: Uuid,
        upload: Option<DocumentUpload>,
    ) -> Result<Submission> {
        let submission = self.store.load(id).await?;
        Operation::SubmitProceedingsRevision.ensure_allowed(submission.status)?;
        let paper = match upload {
            Some(upload) if submission.is_author(caller.user_id) => {
                Some(self.documents.store(upload).await?)
            }
            _ => None,
        };

        let (submission, ()) = self
            .apply_stored(Operation::SubmitProceedingsRevision, submission, |s| {
                proceedings::submit_revision(s, caller, paper.clone())
            })
            .await?;

        self.emit(
            NotificationKind::ProceedingsSubmitted,
            &submission,
            submission.recipients(&[Relationship::ProceedingsEditor]),
            format!(
                "A revised proceedings paper for {} was submitted",
                submission.submission_number
            ),
        )
        .await;
        Ok(submission.view_for(caller))
    }

    pub async fn resume_proceedings_review(&self, caller: &Caller, id: Uuid) -> Result<Submission> {
        let (submission, ()) = self
            .commit(Operation::ResumeProceedingsReview, id, |s| {
                proceedings::resume_review(s, caller)
            })
            .await?;
        Ok(submission.view_for(caller))
    }

    pub async fn publish_proceedings(
        &self,
        caller: &Caller,
        id: Uuid,
        input: PublicationInput,
    ) -> Result<Publication> {
        let (submission, publication) = self
            .commit(Operation::PublishProceedings, id, |s| {
                proceedings::publish(s, caller, input)
            })
            .await?;

        let location = publication
            .doi
            .as_deref()
            .map(|doi| format!("https://doi.org/{}", doi))
            .or_else(|| publication.publication_url.clone())
            .unwrap_or_default();
        self.emit(
            NotificationKind::Published,
            &submission,
            submission.recipients(AUTHORS),
            format!("{} was published: {}", submission.submission_number, location),
        )
        .await;
        Ok(publication)
    }

    pub async fn get_my_proceedings(&self, caller: &Caller) -> Result<Vec<ProceedingsSummary>> {
        Ok(self
            .store
            .list_for_user(caller.user_id)
            .await?
            .iter()
            .filter(|s| s.is_author(caller.user_id))
            .filter_map(proceedings::summary)
            .collect())
    }
}

fn single_recipient(submission: &Submission, user_id: Uuid) -> Vec<AssociatedUser> {
    submission
        .associated_user(user_id)
        .filter(|u| u.preferences.any_enabled())
        .cloned()
        .into_iter()
        .collect()
}
