//! Review Orchestrator: the author-side submission steps, editor assignment,
//! reviewer invitations and reviews, and the editor's decision.
//!
//! Reviewer responses only touch the caller's own assignment slot; the engine
//! relies on that to retry them on version conflicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::User;
use crate::error::{Error, Result};
use crate::storage::DocumentRef;
use crate::submission::{
    Caller, Decision, EditorAssignment, FinalDecision, Operation, Review, ReviewerAssignment,
    ReviewerStatus, Submission, SubmissionStatus,
};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionInput {
    pub decision: Decision,
    #[serde(default)]
    pub editor_comments: String,
}

pub fn upload_paper(submission: &mut Submission, caller: &Caller, paper: DocumentRef) -> Result<()> {
    Operation::UploadPaper.ensure_allowed(submission.status)?;
    submission.ensure_corresponding_author_or_admin(caller)?;
    submission.paper_upload = Some(paper);
    Ok(())
}

pub fn submit_for_review(submission: &mut Submission, caller: &Caller) -> Result<()> {
    Operation::SubmitForReview.ensure_allowed(submission.status)?;
    submission.ensure_corresponding_author_or_admin(caller)?;
    if submission.paper_upload.is_none() {
        return Err(Error::Validation(
            "a paper must be uploaded before submitting for review".to_string(),
        ));
    }
    submission.advance(
        Operation::SubmitForReview,
        SubmissionStatus::Submitted,
        caller.user_id,
    )?;
    submission.submitted_at = Some(Utc::now());
    Ok(())
}

/// Sends a revised paper back for review and opens the next review cycle.
pub fn submit_revision(submission: &mut Submission, caller: &Caller) -> Result<u32> {
    Operation::SubmitRevision.ensure_allowed(submission.status)?;
    submission.ensure_corresponding_author_or_admin(caller)?;

    let decided_at = submission
        .review_workflow
        .final_decision
        .as_ref()
        .map(|d| d.decision_date);
    let revised = match (&submission.paper_upload, decided_at) {
        (Some(paper), Some(decided_at)) => paper.uploaded_at > decided_at,
        (Some(_), None) => true,
        (None, _) => false,
    };
    if !revised {
        return Err(Error::Validation(
            "upload the revised paper before resubmitting".to_string(),
        ));
    }

    submission.advance(Operation::SubmitRevision, SubmissionStatus::Revised, caller.user_id)?;
    submission.review_workflow.cycle += 1;
    Ok(submission.review_workflow.cycle)
}

pub fn withdraw(submission: &mut Submission, caller: &Caller) -> Result<()> {
    Operation::Withdraw.ensure_allowed(submission.status)?;
    submission.ensure_corresponding_author_or_admin(caller)?;
    submission.advance(Operation::Withdraw, SubmissionStatus::Withdrawn, caller.user_id)
}

/// Replaces the active editor. Reviewer assignments are left as they are.
pub fn assign_editor(
    submission: &mut Submission,
    caller: &Caller,
    editor: &User,
    review_deadline: Option<DateTime<Utc>>,
) -> Result<Option<EditorAssignment>> {
    Operation::AssignEditor.ensure_allowed(submission.status)?;
    if !caller.is_admin {
        return Err(Error::Unauthorized(
            "only administrators assign editors".to_string(),
        ));
    }
    if submission.is_author(editor.id) {
        return Err(Error::Validation(
            "an author cannot edit their own submission".to_string(),
        ));
    }

    let previous = submission.review_workflow.editor.replace(EditorAssignment {
        user_id: editor.id,
        assigned_at: Utc::now(),
        assigned_by: caller.user_id,
    });
    if review_deadline.is_some() {
        submission.review_workflow.review_deadline = review_deadline;
    }
    submission.recompute_associated_users();
    Ok(previous)
}

/// Invites a reviewer for the current cycle. The first invitation of a cycle
/// puts the submission under review.
pub fn add_reviewer(
    submission: &mut Submission,
    caller: &Caller,
    reviewer: &User,
) -> Result<ReviewerAssignment> {
    Operation::AddReviewer.ensure_allowed(submission.status)?;
    if !caller.is_admin && !submission.is_editor(caller.user_id) {
        return Err(Error::Unauthorized(
            "only the assigned editor or an administrator invites reviewers".to_string(),
        ));
    }
    if submission.is_author(reviewer.id) {
        return Err(Error::Validation(
            "an author cannot review their own submission".to_string(),
        ));
    }
    if submission.review_workflow.assignment(reviewer.id).is_some() {
        return Err(Error::AlreadyInvited(format!(
            "user {} was already invited in review cycle {}",
            reviewer.id, submission.review_workflow.cycle
        )));
    }

    if submission.status != SubmissionStatus::UnderReview {
        submission.advance(
            Operation::AddReviewer,
            SubmissionStatus::UnderReview,
            caller.user_id,
        )?;
    }

    let assignment = ReviewerAssignment {
        user_id: reviewer.id,
        cycle: submission.review_workflow.cycle,
        status: ReviewerStatus::Invited,
        review: None,
        invited_at: Utc::now(),
        invited_by: caller.user_id,
        responded_at: None,
        completed_at: None,
    };
    submission.review_workflow.reviewers.push(assignment.clone());
    submission.recompute_associated_users();
    Ok(assignment)
}

/// Accepts or declines the caller's own invitation. Declined assignments stay on record.
pub fn respond_to_review(
    submission: &mut Submission,
    reviewer_id: Uuid,
    accept: bool,
) -> Result<ReviewerAssignment> {
    let op = if accept {
        Operation::AcceptReview
    } else {
        Operation::DeclineReview
    };
    op.ensure_allowed(submission.status)?;

    let assignment = submission
        .review_workflow
        .assignment_mut(reviewer_id)
        .ok_or_else(|| Error::NotFound(format!("review assignment for user {}", reviewer_id)))?;
    if assignment.status != ReviewerStatus::Invited {
        return Err(Error::invalid_transition(
            op,
            "review assignment",
            assignment.status.as_str(),
        ));
    }

    assignment.status = if accept {
        ReviewerStatus::Accepted
    } else {
        ReviewerStatus::Declined
    };
    assignment.responded_at = Some(Utc::now());
    let updated = assignment.clone();
    submission.recompute_associated_users();
    Ok(updated)
}

pub fn validate_review(review: &Review) -> Result<()> {
    let in_range = |score: u8| (MIN_SCORE..=MAX_SCORE).contains(&score);
    if !in_range(review.scores.overall) {
        return Err(Error::Validation(format!(
            "overall score must be between {} and {}",
            MIN_SCORE, MAX_SCORE
        )));
    }
    let optional = [
        ("originality", review.scores.originality),
        ("methodology", review.scores.methodology),
        ("clarity", review.scores.clarity),
        ("significance", review.scores.significance),
    ];
    for (name, score) in optional {
        if let Some(score) = score {
            if !in_range(score) {
                return Err(Error::Validation(format!(
                    "{} score must be between {} and {}",
                    name, MIN_SCORE, MAX_SCORE
                )));
            }
        }
    }
    Ok(())
}

pub fn submit_review(
    submission: &mut Submission,
    reviewer_id: Uuid,
    review: Review,
) -> Result<ReviewerAssignment> {
    Operation::SubmitReview.ensure_allowed(submission.status)?;
    validate_review(&review)?;

    let assignment = submission
        .review_workflow
        .assignment_mut(reviewer_id)
        .ok_or_else(|| Error::NotFound(format!("review assignment for user {}", reviewer_id)))?;
    if assignment.status != ReviewerStatus::Accepted {
        return Err(Error::invalid_transition(
            Operation::SubmitReview,
            "review assignment",
            assignment.status.as_str(),
        ));
    }

    assignment.status = ReviewerStatus::Completed;
    assignment.review = Some(review);
    assignment.completed_at = Some(Utc::now());
    Ok(assignment.clone())
}

/// Records the editor's decision. Outstanding reviews do not block it.
pub fn make_decision(
    submission: &mut Submission,
    caller: &Caller,
    input: DecisionInput,
) -> Result<FinalDecision> {
    Operation::MakeDecision.ensure_allowed(submission.status)?;
    if !caller.is_admin && !submission.is_editor(caller.user_id) {
        return Err(Error::Unauthorized(
            "only the assigned editor or an administrator decides".to_string(),
        ));
    }

    let next = match input.decision {
        Decision::Accept => SubmissionStatus::Accepted,
        Decision::Reject => SubmissionStatus::Rejected,
        Decision::MinorRevision | Decision::MajorRevision => SubmissionStatus::RevisionRequired,
    };
    submission.advance(Operation::MakeDecision, next, caller.user_id)?;

    let decision = FinalDecision {
        decision: input.decision,
        editor_comments: input.editor_comments,
        decision_date: Utc::now(),
        decided_by: caller.user_id,
        cycle: submission.review_workflow.cycle,
    };
    if let Some(previous) = submission
        .review_workflow
        .final_decision
        .replace(decision.clone())
    {
        submission.review_workflow.decision_history.push(previous);
    }
    Ok(decision)
}

/// A reviewer's view of one assignment in the submission's current cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewerTask {
    pub submission_id: Uuid,
    pub submission_number: String,
    pub title: String,
    pub submission_status: SubmissionStatus,
    pub review_deadline: Option<DateTime<Utc>>,
    pub assignment: ReviewerAssignment,
}

pub fn reviewer_task(submission: &Submission, reviewer_id: Uuid) -> Option<ReviewerTask> {
    let assignment = submission.review_workflow.assignment(reviewer_id)?;
    Some(ReviewerTask {
        submission_id: submission.id,
        submission_number: submission.submission_number.clone(),
        title: submission.title.clone(),
        submission_status: submission.status,
        review_deadline: submission.review_workflow.review_deadline,
        assignment: assignment.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::fixtures::draft;
    use crate::submission::ReviewScores;

    fn profile(id: Uuid) -> User {
        User {
            id,
            name: "Reviewer".to_string(),
            email: "reviewer@example.edu".to_string(),
            organization: None,
            department: None,
            expertise: vec![],
            credentials: vec![],
        }
    }

    fn paper() -> DocumentRef {
        DocumentRef {
            document_id: "doc-1".to_string(),
            filename: "paper.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 10,
            uploaded_at: Utc::now(),
        }
    }

    fn review(overall: u8, recommendation: Decision) -> Review {
        Review {
            scores: ReviewScores {
                overall,
                originality: Some(4),
                methodology: None,
                clarity: None,
                significance: None,
            },
            recommendation,
            comments_to_authors: "Solid work.".to_string(),
            confidential_comments: None,
        }
    }

    /// A submitted paper with an editor assigned by `admin`.
    fn submitted(owner: Uuid, admin: &Caller, editor: Uuid) -> Submission {
        let mut s = draft(owner);
        upload_paper(&mut s, &Caller::user(owner), paper()).unwrap();
        submit_for_review(&mut s, &Caller::user(owner)).unwrap();
        assign_editor(&mut s, admin, &profile(editor), None).unwrap();
        s
    }

    #[test]
    fn test_submit_requires_paper_and_is_single_shot() {
        let owner = Uuid::new_v4();
        let caller = Caller::user(owner);
        let mut s = draft(owner);

        let err = submit_for_review(&mut s, &caller).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        upload_paper(&mut s, &caller, paper()).unwrap();
        submit_for_review(&mut s, &caller).unwrap();
        assert_eq!(s.status, SubmissionStatus::Submitted);
        assert!(s.submitted_at.is_some());

        let err = submit_for_review(&mut s, &caller).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_only_admin_assigns_editor() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        s.status = SubmissionStatus::Submitted;
        let err = assign_editor(&mut s, &Caller::user(owner), &profile(Uuid::new_v4()), None)
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_reassigning_editor_keeps_reviewers() {
        let owner = Uuid::new_v4();
        let admin = Caller::admin(Uuid::new_v4());
        let first_editor = Uuid::new_v4();
        let mut s = submitted(owner, &admin, first_editor);
        add_reviewer(&mut s, &admin, &profile(Uuid::new_v4())).unwrap();

        // Back to an assignable state through a revision round.
        s.status = SubmissionStatus::Revised;
        let second_editor = Uuid::new_v4();
        let previous = assign_editor(&mut s, &admin, &profile(second_editor), None).unwrap();
        assert_eq!(previous.unwrap().user_id, first_editor);
        assert!(s.is_editor(second_editor));
        assert_eq!(s.review_workflow.reviewers.len(), 1);
        assert!(s.associated_user(first_editor).is_none());
    }

    #[test]
    fn test_first_invitation_starts_review_and_duplicates_fail() {
        let owner = Uuid::new_v4();
        let admin = Caller::admin(Uuid::new_v4());
        let editor = Uuid::new_v4();
        let mut s = submitted(owner, &admin, editor);
        let reviewer = profile(Uuid::new_v4());

        add_reviewer(&mut s, &Caller::user(editor), &reviewer).unwrap();
        assert_eq!(s.status, SubmissionStatus::UnderReview);

        let err = add_reviewer(&mut s, &Caller::user(editor), &reviewer).unwrap_err();
        assert!(matches!(err, Error::AlreadyInvited(_)));

        let err = add_reviewer(&mut s, &Caller::user(editor), &profile(owner)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_submit_review_requires_acceptance_first() {
        let owner = Uuid::new_v4();
        let admin = Caller::admin(Uuid::new_v4());
        let mut s = submitted(owner, &admin, Uuid::new_v4());
        let reviewer = Uuid::new_v4();
        add_reviewer(&mut s, &admin, &profile(reviewer)).unwrap();

        let err = submit_review(&mut s, reviewer, review(4, Decision::Accept)).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(
            s.review_workflow.assignment(reviewer).unwrap().status,
            ReviewerStatus::Invited
        );

        respond_to_review(&mut s, reviewer, true).unwrap();
        let done = submit_review(&mut s, reviewer, review(4, Decision::Accept)).unwrap();
        assert_eq!(done.status, ReviewerStatus::Completed);
        assert_eq!(s.status, SubmissionStatus::UnderReview);
    }

    #[test]
    fn test_scores_out_of_range_are_rejected() {
        let owner = Uuid::new_v4();
        let admin = Caller::admin(Uuid::new_v4());
        let mut s = submitted(owner, &admin, Uuid::new_v4());
        let reviewer = Uuid::new_v4();
        add_reviewer(&mut s, &admin, &profile(reviewer)).unwrap();
        respond_to_review(&mut s, reviewer, true).unwrap();

        for bad in [0u8, 6] {
            let err = submit_review(&mut s, reviewer, review(bad, Decision::Reject)).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        let mut r = review(3, Decision::Reject);
        r.scores.clarity = Some(9);
        assert!(matches!(validate_review(&r), Err(Error::Validation(_))));
    }

    #[test]
    fn test_declined_reviewer_cannot_accept_later() {
        let owner = Uuid::new_v4();
        let admin = Caller::admin(Uuid::new_v4());
        let mut s = submitted(owner, &admin, Uuid::new_v4());
        let reviewer = Uuid::new_v4();
        add_reviewer(&mut s, &admin, &profile(reviewer)).unwrap();

        respond_to_review(&mut s, reviewer, false).unwrap();
        let err = respond_to_review(&mut s, reviewer, true).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(s.review_workflow.reviewers.len(), 1);
        assert!(s.associated_user(reviewer).is_none());

        let err = respond_to_review(&mut s, Uuid::new_v4(), true).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_decision_with_partial_reviews_and_revision_cycle() {
        let owner = Uuid::new_v4();
        let admin = Caller::admin(Uuid::new_v4());
        let editor = Uuid::new_v4();
        let mut s = submitted(owner, &admin, editor);
        add_reviewer(&mut s, &admin, &profile(Uuid::new_v4())).unwrap();

        let err = make_decision(
            &mut s,
            &Caller::user(owner),
            DecisionInput {
                decision: Decision::Accept,
                editor_comments: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        make_decision(
            &mut s,
            &Caller::user(editor),
            DecisionInput {
                decision: Decision::MajorRevision,
                editor_comments: "Expand the robustness section.".to_string(),
            },
        )
        .unwrap();
        assert_eq!(s.status, SubmissionStatus::RevisionRequired);

        // Resubmitting without a new upload is refused.
        let err = submit_revision(&mut s, &Caller::user(owner)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let mut revised = paper();
        revised.uploaded_at = Utc::now() + chrono::Duration::seconds(1);
        upload_paper(&mut s, &Caller::user(owner), revised).unwrap();
        let cycle = submit_revision(&mut s, &Caller::user(owner)).unwrap();
        assert_eq!(cycle, 2);
        assert_eq!(s.status, SubmissionStatus::Revised);
        assert!(s.review_workflow.current_cycle_reviewers().next().is_none());
    }

    #[test]
    fn test_withdraw_is_terminal() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        withdraw(&mut s, &Caller::user(owner)).unwrap();
        assert_eq!(s.status, SubmissionStatus::Withdrawn);
        let err = withdraw(&mut s, &Caller::user(owner)).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }
}
