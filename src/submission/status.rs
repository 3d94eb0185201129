//! Submission lifecycle states and the transition table every component consults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Lifecycle status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
    RevisionRequired,
    Revised,
    Withdrawn,
    Presented,
    ProceedingsInvited,
    ProceedingsSubmitted,
    ProceedingsUnderReview,
    ProceedingsAccepted,
    ProceedingsRejected,
    ProceedingsRevisionRequired,
    ProceedingsRevised,
    Published,
}

use SubmissionStatus::*;

/// Statuses in which the corresponding author may still edit authorship.
pub const EDITABLE: &[SubmissionStatus] = &[Draft, Submitted, RevisionRequired, Revised];

const PRESENTATION_PLANNING: &[SubmissionStatus] = &[
    Draft,
    Submitted,
    UnderReview,
    RevisionRequired,
    Revised,
    Accepted,
];

const WITHDRAWABLE: &[SubmissionStatus] =
    &[Draft, Submitted, UnderReview, RevisionRequired, Revised];

const ALL: &[SubmissionStatus] = &[
    Draft,
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
    RevisionRequired,
    Revised,
    Withdrawn,
    Presented,
    ProceedingsInvited,
    ProceedingsSubmitted,
    ProceedingsUnderReview,
    ProceedingsAccepted,
    ProceedingsRejected,
    ProceedingsRevisionRequired,
    ProceedingsRevised,
    Published,
];

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Draft => "draft",
            Submitted => "submitted",
            UnderReview => "under_review",
            Accepted => "accepted",
            Rejected => "rejected",
            RevisionRequired => "revision_required",
            Revised => "revised",
            Withdrawn => "withdrawn",
            Presented => "presented",
            ProceedingsInvited => "proceedings_invited",
            ProceedingsSubmitted => "proceedings_submitted",
            ProceedingsUnderReview => "proceedings_under_review",
            ProceedingsAccepted => "proceedings_accepted",
            ProceedingsRejected => "proceedings_rejected",
            ProceedingsRevisionRequired => "proceedings_revision_required",
            ProceedingsRevised => "proceedings_revised",
            Published => "published",
        }
    }

    /// Statuses directly reachable from this one.
    pub fn successors(&self) -> &'static [SubmissionStatus] {
        match self {
            Draft => &[Submitted, Withdrawn],
            Submitted => &[UnderReview, Withdrawn],
            UnderReview => &[Accepted, Rejected, RevisionRequired, Withdrawn],
            RevisionRequired => &[Revised, Withdrawn],
            Revised => &[UnderReview, Withdrawn],
            Accepted => &[Presented],
            Presented => &[ProceedingsInvited],
            ProceedingsInvited => &[ProceedingsSubmitted],
            ProceedingsSubmitted => &[ProceedingsUnderReview],
            ProceedingsUnderReview => &[
                ProceedingsAccepted,
                ProceedingsRejected,
                ProceedingsRevisionRequired,
            ],
            ProceedingsRevisionRequired => &[ProceedingsRevised],
            ProceedingsRevised => &[ProceedingsUnderReview],
            ProceedingsAccepted => &[Published],
            Rejected | Withdrawn | ProceedingsRejected | Published => &[],
        }
    }

    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl FromStr for SubmissionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ALL.iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown submission status '{}'", s)))
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every mutating operation the engine exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    UploadPaper,
    SubmitForReview,
    SubmitRevision,
    Withdraw,
    AddCoAuthor,
    RemoveCoAuthor,
    ReorderCoAuthors,
    AddFacultySponsor,
    RemoveFacultySponsor,
    DesignatePresenter,
    RemovePresenter,
    UpdateAvailability,
    UpdateNotificationPreferences,
    AssignEditor,
    AddReviewer,
    AcceptReview,
    DeclineReview,
    SubmitReview,
    MakeDecision,
    MarkPresented,
    InviteToProceedings,
    RespondToInvitation,
    SubmitProceedingsPaper,
    AssignProceedingsEditor,
    MakeProceedingsDecision,
    SubmitProceedingsRevision,
    ResumeProceedingsReview,
    PublishProceedings,
}

impl Operation {
    /// The statuses in which this operation is legal.
    pub fn allowed_in(&self) -> &'static [SubmissionStatus] {
        use Operation::*;
        match self {
            UploadPaper => &[Draft, RevisionRequired],
            SubmitForReview => &[Draft],
            SubmitRevision => &[RevisionRequired],
            Withdraw => WITHDRAWABLE,
            AddCoAuthor | RemoveCoAuthor | ReorderCoAuthors | AddFacultySponsor
            | RemoveFacultySponsor => EDITABLE,
            DesignatePresenter | RemovePresenter | UpdateAvailability => PRESENTATION_PLANNING,
            UpdateNotificationPreferences => ALL,
            AssignEditor => &[Submitted, Revised],
            AddReviewer => &[Submitted, Revised, UnderReview],
            AcceptReview | DeclineReview | SubmitReview | MakeDecision => &[UnderReview],
            MarkPresented => &[Accepted],
            InviteToProceedings => &[Presented],
            RespondToInvitation | SubmitProceedingsPaper => &[ProceedingsInvited],
            AssignProceedingsEditor => &[ProceedingsSubmitted],
            MakeProceedingsDecision => &[ProceedingsUnderReview],
            SubmitProceedingsRevision => &[ProceedingsRevisionRequired],
            ResumeProceedingsReview => &[ProceedingsRevised],
            PublishProceedings => &[ProceedingsAccepted],
        }
    }

    pub fn is_allowed_in(&self, status: SubmissionStatus) -> bool {
        self.allowed_in().contains(&status)
    }

    /// Fails with `InvalidStateTransition` when the operation is not legal in `status`.
    pub fn ensure_allowed(&self, status: SubmissionStatus) -> Result<()> {
        if self.is_allowed_in(status) {
            Ok(())
        } else {
            Err(Error::invalid_transition(*self, "submission", status.as_str()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        use Operation::*;
        match self {
            UploadPaper => "upload_paper",
            SubmitForReview => "submit_for_review",
            SubmitRevision => "submit_revision",
            Withdraw => "withdraw",
            AddCoAuthor => "add_co_author",
            RemoveCoAuthor => "remove_co_author",
            ReorderCoAuthors => "reorder_co_authors",
            AddFacultySponsor => "add_faculty_sponsor",
            RemoveFacultySponsor => "remove_faculty_sponsor",
            DesignatePresenter => "designate_presenter",
            RemovePresenter => "remove_presenter",
            UpdateAvailability => "update_availability",
            UpdateNotificationPreferences => "update_notification_preferences",
            AssignEditor => "assign_editor",
            AddReviewer => "add_reviewer",
            AcceptReview => "accept_review",
            DeclineReview => "decline_review",
            SubmitReview => "submit_review",
            MakeDecision => "make_decision",
            MarkPresented => "mark_presented",
            InviteToProceedings => "invite_to_proceedings",
            RespondToInvitation => "respond_to_invitation",
            SubmitProceedingsPaper => "submit_proceedings_paper",
            AssignProceedingsEditor => "assign_proceedings_editor",
            MakeProceedingsDecision => "make_proceedings_decision",
            SubmitProceedingsRevision => "submit_proceedings_revision",
            ResumeProceedingsReview => "resume_proceedings_review",
            PublishProceedings => "publish_proceedings",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::SubmissionStatus::*;
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<SubmissionStatus>().unwrap(), *status);
        }
        assert!(matches!(
            "declined".parse::<SubmissionStatus>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_review_cycle_edges() {
        assert!(Draft.can_transition_to(Submitted));
        assert!(UnderReview.can_transition_to(RevisionRequired));
        assert!(RevisionRequired.can_transition_to(Revised));
        assert!(Revised.can_transition_to(UnderReview));
        assert!(!Draft.can_transition_to(Accepted));
        assert!(!Submitted.can_transition_to(Accepted));
    }

    #[test]
    fn test_proceedings_path_requires_presentation() {
        assert!(!Accepted.can_transition_to(ProceedingsInvited));
        assert!(Presented.can_transition_to(ProceedingsInvited));
        assert!(ProceedingsRevised.can_transition_to(ProceedingsUnderReview));
        assert!(ProceedingsAccepted.can_transition_to(Published));
    }

    #[test]
    fn test_terminal_statuses() {
        for status in [Rejected, Withdrawn, ProceedingsRejected, Published] {
            assert!(status.is_terminal(), "{} should be terminal", status);
        }
        assert!(!ProceedingsInvited.is_terminal());
    }

    #[test]
    fn test_every_operation_target_is_reachable() {
        // Each operation that advances status must be legal in a state whose
        // successor list contains the target it writes.
        let advancing = [
            (Operation::SubmitForReview, Submitted),
            (Operation::SubmitRevision, Revised),
            (Operation::MarkPresented, Presented),
            (Operation::InviteToProceedings, ProceedingsInvited),
            (Operation::SubmitProceedingsPaper, ProceedingsSubmitted),
            (Operation::AssignProceedingsEditor, ProceedingsUnderReview),
            (Operation::SubmitProceedingsRevision, ProceedingsRevised),
            (Operation::ResumeProceedingsReview, ProceedingsUnderReview),
            (Operation::PublishProceedings, Published),
        ];
        for (op, target) in advancing {
            assert!(
                op.allowed_in().iter().all(|s| s.can_transition_to(target)),
                "{} cannot reach {}",
                op,
                target
            );
        }
    }

    #[test]
    fn test_ensure_allowed_reports_state() {
        let err = Operation::SubmitForReview.ensure_allowed(Submitted).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert!(err.to_string().contains("submitted"));
        assert!(Operation::AddCoAuthor.ensure_allowed(Revised).is_ok());
        assert!(Operation::AddCoAuthor.ensure_allowed(UnderReview).is_err());
    }
}
