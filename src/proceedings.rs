//! Proceedings Orchestrator: the optional post-conference publication track.
//!
//! The proceedings record is created by the first invitation and only exists
//! for papers that were presented.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::directory::User;
use crate::error::{Error, Result};
use crate::storage::DocumentRef;
use crate::submission::{
    AuthorResponse, Caller, Decision, EditorAssignment, Operation, ProceedingsDecision,
    ProceedingsRecord, Publication, Submission, SubmissionStatus,
};

static DOI: OnceLock<Regex> = OnceLock::new();
static HTTP_URL: OnceLock<Regex> = OnceLock::new();

fn doi_pattern() -> &'static Regex {
    DOI.get_or_init(|| Regex::new(r"^10\.\d{4,9}/\S+$").expect("valid DOI pattern"))
}

fn url_pattern() -> &'static Regex {
    HTTP_URL.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid URL pattern"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationResponseInput {
    pub accepted: bool,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProceedingsDecisionInput {
    pub decision: Decision,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicationInput {
    pub doi: Option<String>,
    pub publication_url: Option<String>,
    pub volume: Option<String>,
    pub pages: Option<String>,
}

/// What an author sees about one of their papers on the proceedings track.
#[derive(Debug, Clone, Serialize)]
pub struct ProceedingsSummary {
    pub submission_id: Uuid,
    pub submission_number: String,
    pub title: String,
    pub status: SubmissionStatus,
    pub invitation_sent_at: DateTime<Utc>,
    pub invitation_deadline: Option<DateTime<Utc>>,
    pub author_response: Option<AuthorResponse>,
    pub declined: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub paper_filename: Option<String>,
    pub decision: Option<ProceedingsDecision>,
    pub publication: Option<Publication>,
}

pub fn summary(submission: &Submission) -> Option<ProceedingsSummary> {
    let record = submission.proceedings.as_ref()?;
    Some(ProceedingsSummary {
        submission_id: submission.id,
        submission_number: submission.submission_number.clone(),
        title: submission.title.clone(),
        status: submission.status,
        invitation_sent_at: record.invitation_sent_at,
        invitation_deadline: record.invitation_deadline,
        author_response: record.author_response.clone(),
        declined: submission.proceedings_declined(),
        submitted_at: record.submitted_at,
        paper_filename: record.paper_upload.as_ref().map(|p| p.filename.clone()),
        decision: record.decision.clone(),
        publication: record.publication.clone(),
    })
}

fn ensure_admin(caller: &Caller, action: &str) -> Result<()> {
    if caller.is_admin {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!(
            "only administrators may {}",
            action
        )))
    }
}

fn ensure_author(submission: &Submission, caller: &Caller) -> Result<()> {
    if submission.is_author(caller.user_id) {
        Ok(())
    } else {
        Err(Error::Unauthorized(
            "only authors of the submission may act on its proceedings".to_string(),
        ))
    }
}

fn record_mut(submission: &mut Submission) -> Result<&mut ProceedingsRecord> {
    submission
        .proceedings
        .as_mut()
        .ok_or_else(|| Error::NotFound("proceedings record".to_string()))
}

pub fn mark_presented(submission: &mut Submission, caller: &Caller) -> Result<()> {
    Operation::MarkPresented.ensure_allowed(submission.status)?;
    ensure_admin(caller, "record presentations")?;
    submission.advance(
        Operation::MarkPresented,
        SubmissionStatus::Presented,
        caller.user_id,
    )
}

/// A second invitation fails `AlreadyInvited` even though the status has moved on.
pub fn invite(
    submission: &mut Submission,
    caller: &Caller,
    deadline: Option<DateTime<Utc>>,
) -> Result<()> {
    if submission
        .proceedings
        .as_ref()
        .map_or(false, |p| p.invitation_sent)
    {
        return Err(Error::AlreadyInvited(format!(
            "submission {} already has a proceedings invitation",
            submission.submission_number
        )));
    }
    Operation::InviteToProceedings.ensure_allowed(submission.status)?;
    ensure_admin(caller, "send proceedings invitations")?;

    submission.advance(
        Operation::InviteToProceedings,
        SubmissionStatus::ProceedingsInvited,
        caller.user_id,
    )?;
    submission.proceedings = Some(ProceedingsRecord {
        invitation_sent: true,
        invitation_sent_at: Utc::now(),
        invitation_sent_by: caller.user_id,
        invitation_deadline: deadline,
        author_response: None,
        submitted_at: None,
        paper_upload: None,
        proceedings_review: None,
        decision: None,
        publication: None,
    });
    Ok(())
}

/// Records the authors' answer. Declining leaves the status at `proceedings_invited`.
pub fn respond(
    submission: &mut Submission,
    caller: &Caller,
    input: InvitationResponseInput,
    now: DateTime<Utc>,
) -> Result<AuthorResponse> {
    Operation::RespondToInvitation.ensure_allowed(submission.status)?;
    ensure_author(submission, caller)?;

    let record = record_mut(submission)?;
    if record.author_response.is_some() {
        return Err(Error::AlreadyResponded);
    }
    if let Some(deadline) = record.invitation_deadline {
        if now > deadline {
            return Err(Error::InvitationExpired { deadline });
        }
    }

    let response = AuthorResponse {
        accepted_invitation: input.accepted,
        comments: input.comments,
        response_date: now,
        responding_user_id: caller.user_id,
    };
    record.author_response = Some(response.clone());
    Ok(response)
}

pub fn submit_paper(
    submission: &mut Submission,
    caller: &Caller,
    paper: Option<DocumentRef>,
) -> Result<()> {
    Operation::SubmitProceedingsPaper.ensure_allowed(submission.status)?;
    ensure_author(submission, caller)?;

    let accepted = submission
        .proceedings
        .as_ref()
        .and_then(|p| p.author_response.as_ref())
        .map_or(false, |r| r.accepted_invitation);
    if !accepted {
        return Err(Error::InvitationNotAccepted);
    }
    let paper = paper.ok_or_else(|| {
        Error::Validation("a proceedings paper file is required".to_string())
    })?;

    submission.advance(
        Operation::SubmitProceedingsPaper,
        SubmissionStatus::ProceedingsSubmitted,
        caller.user_id,
    )?;
    let record = record_mut(submission)?;
    record.submitted_at = Some(Utc::now());
    record.paper_upload = Some(paper);
    Ok(())
}

pub fn assign_editor(submission: &mut Submission, caller: &Caller, editor: &User) -> Result<()> {
    Operation::AssignProceedingsEditor.ensure_allowed(submission.status)?;
    ensure_admin(caller, "assign proceedings editors")?;
    if submission.is_author(editor.id) {
        return Err(Error::Validation(
            "an author cannot edit their own proceedings paper".to_string(),
        ));
    }

    submission.advance(
        Operation::AssignProceedingsEditor,
        SubmissionStatus::ProceedingsUnderReview,
        caller.user_id,
    )?;
    record_mut(submission)?.proceedings_review = Some(EditorAssignment {
        user_id: editor.id,
        assigned_at: Utc::now(),
        assigned_by: caller.user_id,
    });
    submission.recompute_associated_users();
    Ok(())
}

pub fn make_decision(
    submission: &mut Submission,
    caller: &Caller,
    input: ProceedingsDecisionInput,
) -> Result<ProceedingsDecision> {
    Operation::MakeProceedingsDecision.ensure_allowed(submission.status)?;
    if !caller.is_admin && !submission.is_proceedings_editor(caller.user_id) {
        return Err(Error::Unauthorized(
            "only the proceedings editor or an administrator decides".to_string(),
        ));
    }

    let next = match input.decision {
        Decision::Accept => SubmissionStatus::ProceedingsAccepted,
        Decision::Reject => SubmissionStatus::ProceedingsRejected,
        Decision::MinorRevision | Decision::MajorRevision => {
            SubmissionStatus::ProceedingsRevisionRequired
        }
    };
    submission.advance(Operation::MakeProceedingsDecision, next, caller.user_id)?;

    let decision = ProceedingsDecision {
        decision: input.decision,
        comments: input.comments,
        decision_date: Utc::now(),
        decided_by: caller.user_id,
    };
    record_mut(submission)?.decision = Some(decision.clone());
    Ok(decision)
}

pub fn submit_revision(
    submission: &mut Submission,
    caller: &Caller,
    paper: Option<DocumentRef>,
) -> Result<()> {
    Operation::SubmitProceedingsRevision.ensure_allowed(submission.status)?;
    ensure_author(submission, caller)?;
    let paper = paper.ok_or_else(|| {
        Error::Validation("a revised proceedings paper file is required".to_string())
    })?;

    submission.advance(
        Operation::SubmitProceedingsRevision,
        SubmissionStatus::ProceedingsRevised,
        caller.user_id,
    )?;
    let record = record_mut(submission)?;
    record.paper_upload = Some(paper);
    record.submitted_at = Some(Utc::now());
    Ok(())
}

pub fn resume_review(submission: &mut Submission, caller: &Caller) -> Result<()> {
    Operation::ResumeProceedingsReview.ensure_allowed(submission.status)?;
    if !caller.is_admin && !submission.is_proceedings_editor(caller.user_id) {
        return Err(Error::Unauthorized(
            "only the proceedings editor or an administrator resumes review".to_string(),
        ));
    }
    submission.advance(
        Operation::ResumeProceedingsReview,
        SubmissionStatus::ProceedingsUnderReview,
        caller.user_id,
    )
}

pub fn validate_publication(input: &PublicationInput) -> Result<()> {
    if let Some(doi) = input.doi.as_deref() {
        if !doi_pattern().is_match(doi.trim()) {
            return Err(Error::Validation(format!("'{}' is not a DOI", doi)));
        }
    }
    if let Some(url) = input.publication_url.as_deref() {
        if !url_pattern().is_match(url.trim()) {
            return Err(Error::Validation(format!(
                "'{}' is not an http(s) URL",
                url
            )));
        }
    }
    if input.doi.is_none() && input.publication_url.is_none() {
        return Err(Error::Validation(
            "publication needs a DOI or a URL".to_string(),
        ));
    }
    Ok(())
}

pub fn publish(
    submission: &mut Submission,
    caller: &Caller,
    input: PublicationInput,
) -> Result<Publication> {
    Operation::PublishProceedings.ensure_allowed(submission.status)?;
    ensure_admin(caller, "publish proceedings")?;
    validate_publication(&input)?;

    submission.advance(
        Operation::PublishProceedings,
        SubmissionStatus::Published,
        caller.user_id,
    )?;
    let publication = Publication {
        doi: input.doi.map(|d| d.trim().to_string()),
        publication_url: input.publication_url.map(|u| u.trim().to_string()),
        volume: input.volume,
        pages: input.pages,
        published_at: Utc::now(),
    };
    record_mut(submission)?.publication = Some(publication.clone());
    Ok(publication)
}
