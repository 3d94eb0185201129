//! The Submission aggregate and the value objects embedded in it.
//!
//! A submission is only ever mutated as a whole: the engine loads it, one of
//! the component modules (authorship, review, proceedings) mutates the loaded
//! copy, and the store writes it back under optimistic versioning.

mod status;

pub use status::{Operation, SubmissionStatus, EDITABLE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::DocumentRef;

/// The identity an operation runs under, as asserted by the authentication gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchType {
    Empirical,
    Theoretical,
    CaseStudy,
    LiteratureReview,
    Pedagogical,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationType {
    Paper,
    Poster,
    Panel,
    Workshop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcademicLevel {
    Undergraduate,
    Graduate,
    Doctoral,
    Faculty,
    Professional,
}

impl AcademicLevel {
    /// Student papers are the only ones that carry faculty sponsors.
    pub fn is_student(&self) -> bool {
        matches!(
            self,
            AcademicLevel::Undergraduate | AcademicLevel::Graduate | AcademicLevel::Doctoral
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    CoAuthor,
    FacultyAdvisor,
    FacultyMentor,
    FacultySponsor,
    StudentResearcher,
}

impl AuthorRole {
    pub fn is_faculty(&self) -> bool {
        matches!(
            self,
            AuthorRole::FacultyAdvisor | AuthorRole::FacultyMentor | AuthorRole::FacultySponsor
        )
    }
}

/// Who an author or sponsor record refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthorIdentity {
    /// A platform user; profile fields are copied at the time of linking.
    Linked {
        user_id: Uuid,
        name: String,
        email: String,
        affiliation: Option<String>,
    },
    /// Someone without a platform account.
    External {
        name: String,
        institution: String,
        email: Option<String>,
    },
}

impl AuthorIdentity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuthorIdentity::Linked { user_id, .. } => Some(*user_id),
            AuthorIdentity::External { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AuthorIdentity::Linked { name, .. } | AuthorIdentity::External { name, .. } => name,
        }
    }

    pub fn affiliation(&self) -> Option<&str> {
        match self {
            AuthorIdentity::Linked { affiliation, .. } => affiliation.as_deref(),
            AuthorIdentity::External { institution, .. } => Some(institution),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, AuthorIdentity::External { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub identity: AuthorIdentity,
    pub role: AuthorRole,
    /// Byline position; 0 for the corresponding author, 1..=N for co-authors
    pub order: u32,
    pub is_student_author: bool,
    pub is_presenter: bool,
    pub is_primary_presenter: bool,
    pub is_known_collaborator: bool,
    pub added_at: DateTime<Utc>,
}

impl Author {
    pub fn new(identity: AuthorIdentity, role: AuthorRole, order: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            role,
            order,
            is_student_author: false,
            is_presenter: false,
            is_primary_presenter: false,
            is_known_collaborator: false,
            added_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.identity.user_id()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sponsor {
    pub id: Uuid,
    pub identity: AuthorIdentity,
    pub role: AuthorRole,
    pub department: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Which author list an author id is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    Corresponding,
    CoAuthor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[serde(alias = "accepted")]
    Accept,
    MinorRevision,
    MajorRevision,
    #[serde(alias = "rejected")]
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::MinorRevision => "minor_revision",
            Decision::MajorRevision => "major_revision",
            Decision::Reject => "reject",
        }
    }

    pub fn requires_revision(&self) -> bool {
        matches!(self, Decision::MinorRevision | Decision::MajorRevision)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerStatus {
    Invited,
    Accepted,
    Declined,
    Completed,
}

impl ReviewerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewerStatus::Invited => "invited",
            ReviewerStatus::Accepted => "accepted",
            ReviewerStatus::Declined => "declined",
            ReviewerStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewScores {
    pub overall: u8,
    #[serde(default)]
    pub originality: Option<u8>,
    #[serde(default)]
    pub methodology: Option<u8>,
    #[serde(default)]
    pub clarity: Option<u8>,
    #[serde(default)]
    pub significance: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub scores: ReviewScores,
    pub recommendation: Decision,
    pub comments_to_authors: String,
    #[serde(default)]
    pub confidential_comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerAssignment {
    pub user_id: Uuid,
    /// Review cycle the invitation belongs to
    pub cycle: u32,
    pub status: ReviewerStatus,
    pub review: Option<Review>,
    pub invited_at: DateTime<Utc>,
    pub invited_by: Uuid,
    pub responded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorAssignment {
    pub user_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    pub decision: Decision,
    pub editor_comments: String,
    pub decision_date: DateTime<Utc>,
    pub decided_by: Uuid,
    pub cycle: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewWorkflow {
    pub editor: Option<EditorAssignment>,
    pub reviewers: Vec<ReviewerAssignment>,
    pub cycle: u32,
    pub review_deadline: Option<DateTime<Utc>>,
    pub final_decision: Option<FinalDecision>,
    /// Decisions from earlier revision rounds, oldest first
    #[serde(default)]
    pub decision_history: Vec<FinalDecision>,
}

impl Default for ReviewWorkflow {
    fn default() -> Self {
        Self {
            editor: None,
            reviewers: Vec::new(),
            cycle: 1,
            review_deadline: None,
            final_decision: None,
            decision_history: Vec::new(),
        }
    }
}

impl ReviewWorkflow {
    /// The caller's assignment in the current review cycle.
    pub fn assignment(&self, user_id: Uuid) -> Option<&ReviewerAssignment> {
        self.reviewers
            .iter()
            .find(|r| r.user_id == user_id && r.cycle == self.cycle)
    }

    pub fn assignment_mut(&mut self, user_id: Uuid) -> Option<&mut ReviewerAssignment> {
        let cycle = self.cycle;
        self.reviewers
            .iter_mut()
            .find(|r| r.user_id == user_id && r.cycle == cycle)
    }

    pub fn current_cycle_reviewers(&self) -> impl Iterator<Item = &ReviewerAssignment> {
        self.reviewers.iter().filter(move |r| r.cycle == self.cycle)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub accepted_invitation: bool,
    pub comments: Option<String>,
    pub response_date: DateTime<Utc>,
    pub responding_user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProceedingsDecision {
    pub decision: Decision,
    pub comments: String,
    pub decision_date: DateTime<Utc>,
    pub decided_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub doi: Option<String>,
    pub publication_url: Option<String>,
    pub volume: Option<String>,
    pub pages: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProceedingsRecord {
    pub invitation_sent: bool,
    pub invitation_sent_at: DateTime<Utc>,
    pub invitation_sent_by: Uuid,
    pub invitation_deadline: Option<DateTime<Utc>>,
    pub author_response: Option<AuthorResponse>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub paper_upload: Option<DocumentRef>,
    pub proceedings_review: Option<EditorAssignment>,
    pub decision: Option<ProceedingsDecision>,
    pub publication: Option<Publication>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub day: String,
    pub morning: bool,
    pub afternoon: bool,
    pub evening: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenterAvailability {
    pub days: Vec<DayAvailability>,
    pub conflict_notes: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationDetails {
    pub availability: Option<PresenterAvailability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    CorrespondingAuthor,
    CoAuthor,
    FacultySponsor,
    Editor,
    Reviewer,
    ProceedingsEditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: bool,
    pub sms: bool,
    pub in_app: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            in_app: true,
        }
    }
}

impl NotificationPreferences {
    pub fn any_enabled(&self) -> bool {
        self.email || self.sms || self.in_app
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedUser {
    pub user_id: Uuid,
    pub relationships: Vec<Relationship>,
    pub preferences: NotificationPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: SubmissionStatus,
    pub to: SubmissionStatus,
    pub operation: Operation,
    pub changed_by: Uuid,
    pub changed_at: DateTime<Utc>,
}

/// Descriptive fields supplied when a submission is created.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
    pub conference_id: Uuid,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub research_type: ResearchType,
    pub presentation_type: PresentationType,
    pub discipline: String,
    pub academic_level: AcademicLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub submission_number: String,
    /// Optimistic concurrency token; bumped by the store on every write
    pub version: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub research_type: ResearchType,
    pub presentation_type: PresentationType,
    pub discipline: String,
    pub academic_level: AcademicLevel,
    pub conference_id: Uuid,
    pub conference_year: i32,
    pub status: SubmissionStatus,
    pub corresponding_author: Author,
    pub co_authors: Vec<Author>,
    pub faculty_sponsors: Vec<Sponsor>,
    pub paper_upload: Option<DocumentRef>,
    pub review_workflow: ReviewWorkflow,
    pub proceedings: Option<ProceedingsRecord>,
    pub presentation_details: PresentationDetails,
    pub associated_users: Vec<AssociatedUser>,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn new(
        data: NewSubmission,
        submission_number: String,
        conference_year: i32,
        corresponding_author: Author,
    ) -> Self {
        let now = Utc::now();
        let mut submission = Self {
            id: Uuid::new_v4(),
            submission_number,
            version: 0,
            title: data.title.trim().to_string(),
            abstract_text: data.abstract_text,
            keywords: data.keywords,
            research_type: data.research_type,
            presentation_type: data.presentation_type,
            discipline: data.discipline,
            academic_level: data.academic_level,
            conference_id: data.conference_id,
            conference_year,
            status: SubmissionStatus::Draft,
            corresponding_author,
            co_authors: Vec::new(),
            faculty_sponsors: Vec::new(),
            paper_upload: None,
            review_workflow: ReviewWorkflow::default(),
            proceedings: None,
            presentation_details: PresentationDetails::default(),
            associated_users: Vec::new(),
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
            submitted_at: None,
        };
        submission.recompute_associated_users();
        submission
    }

    /// Moves to `to`, refusing any edge the transition table does not contain.
    pub fn advance(&mut self, operation: Operation, to: SubmissionStatus, by: Uuid) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(Error::invalid_transition(
                operation,
                "submission",
                self.status.as_str(),
            ));
        }
        self.status_history.push(StatusChange {
            from: self.status,
            to,
            operation,
            changed_by: by,
            changed_at: Utc::now(),
        });
        self.status = to;
        Ok(())
    }

    pub fn is_corresponding_author(&self, user_id: Uuid) -> bool {
        self.corresponding_author.user_id() == Some(user_id)
    }

    /// True for the corresponding author and linked co-authors.
    pub fn is_author(&self, user_id: Uuid) -> bool {
        self.author_user_ids().any(|id| id == user_id)
    }

    /// Linked user ids of the corresponding author and co-authors, in byline order.
    pub fn author_user_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(&self.corresponding_author)
            .chain(self.co_authors.iter())
            .filter_map(Author::user_id)
    }

    pub fn author_mut(&mut self, author_id: Uuid, kind: AuthorKind) -> Option<&mut Author> {
        match kind {
            AuthorKind::Corresponding => Some(&mut self.corresponding_author)
                .filter(|a| a.id == author_id),
            AuthorKind::CoAuthor => self.co_authors.iter_mut().find(|a| a.id == author_id),
        }
    }

    pub fn ensure_corresponding_author_or_admin(&self, caller: &Caller) -> Result<()> {
        if caller.is_admin || self.is_corresponding_author(caller.user_id) {
            Ok(())
        } else {
            Err(Error::Unauthorized(
                "only the corresponding author may change this submission".to_string(),
            ))
        }
    }

    pub fn ensure_author_or_admin(&self, caller: &Caller) -> Result<()> {
        if caller.is_admin || self.is_author(caller.user_id) {
            Ok(())
        } else {
            Err(Error::Unauthorized(
                "caller is not an author of this submission".to_string(),
            ))
        }
    }

    pub fn ensure_associated_or_admin(&self, caller: &Caller) -> Result<()> {
        if caller.is_admin || self.associated_user(caller.user_id).is_some() {
            Ok(())
        } else {
            Err(Error::Unauthorized(
                "caller has no relationship to this submission".to_string(),
            ))
        }
    }

    pub fn is_editor(&self, user_id: Uuid) -> bool {
        self.review_workflow
            .editor
            .as_ref()
            .map_or(false, |e| e.user_id == user_id)
    }

    pub fn is_proceedings_editor(&self, user_id: Uuid) -> bool {
        self.proceedings
            .as_ref()
            .and_then(|p| p.proceedings_review.as_ref())
            .map_or(false, |e| e.user_id == user_id)
    }

    pub fn associated_user(&self, user_id: Uuid) -> Option<&AssociatedUser> {
        self.associated_users.iter().find(|u| u.user_id == user_id)
    }

    /// Admins, editors and reviewers of any cycle.
    pub fn is_review_team(&self, caller: &Caller) -> bool {
        caller.is_admin
            || self.is_editor(caller.user_id)
            || self.is_proceedings_editor(caller.user_id)
            || self
                .review_workflow
                .reviewers
                .iter()
                .any(|r| r.user_id == caller.user_id)
    }

    /// The aggregate as `caller` may read it. Outside the review team, reviews
    /// lose their confidential comments and reviewers are anonymous.
    pub fn view_for(mut self, caller: &Caller) -> Submission {
        if self.is_review_team(caller) {
            return self;
        }
        for assignment in &mut self.review_workflow.reviewers {
            assignment.user_id = Uuid::nil();
            assignment.invited_by = Uuid::nil();
            if let Some(review) = assignment.review.as_mut() {
                review.confidential_comments = None;
            }
        }
        for user in &mut self.associated_users {
            user.relationships.retain(|r| *r != Relationship::Reviewer);
        }
        self.associated_users.retain(|u| !u.relationships.is_empty());
        self
    }

    /// The proceedings path ends here when the authors turned the invitation down.
    pub fn proceedings_declined(&self) -> bool {
        self.proceedings
            .as_ref()
            .and_then(|p| p.author_response.as_ref())
            .map_or(false, |r| !r.accepted_invitation)
    }

    /// Rebuilds `associated_users` from authorship and review-team membership,
    /// keeping each remaining user's notification preferences.
    pub fn recompute_associated_users(&mut self) {
        let mut memberships: Vec<(Uuid, Relationship)> = Vec::new();
        if let Some(id) = self.corresponding_author.user_id() {
            memberships.push((id, Relationship::CorrespondingAuthor));
        }
        for author in &self.co_authors {
            if let Some(id) = author.user_id() {
                memberships.push((id, Relationship::CoAuthor));
            }
        }
        for sponsor in &self.faculty_sponsors {
            if let Some(id) = sponsor.identity.user_id() {
                memberships.push((id, Relationship::FacultySponsor));
            }
        }
        if let Some(editor) = &self.review_workflow.editor {
            memberships.push((editor.user_id, Relationship::Editor));
        }
        for reviewer in &self.review_workflow.reviewers {
            if reviewer.status != ReviewerStatus::Declined {
                memberships.push((reviewer.user_id, Relationship::Reviewer));
            }
        }
        if let Some(editor) = self
            .proceedings
            .as_ref()
            .and_then(|p| p.proceedings_review.as_ref())
        {
            memberships.push((editor.user_id, Relationship::ProceedingsEditor));
        }

        let previous = std::mem::take(&mut self.associated_users);
        for (user_id, relationship) in memberships {
            match self.associated_users.iter_mut().find(|u| u.user_id == user_id) {
                Some(existing) => {
                    if !existing.relationships.contains(&relationship) {
                        existing.relationships.push(relationship);
                    }
                }
                None => {
                    let preferences = previous
                        .iter()
                        .find(|u| u.user_id == user_id)
                        .map(|u| u.preferences)
                        .unwrap_or_default();
                    self.associated_users.push(AssociatedUser {
                        user_id,
                        relationships: vec![relationship],
                        preferences,
                    });
                }
            }
        }
    }

    /// Stores a user's channel choices for this submission.
    pub fn set_preferences(
        &mut self,
        user_id: Uuid,
        preferences: NotificationPreferences,
    ) -> Result<()> {
        let user = self
            .associated_users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| {
                Error::Unauthorized("caller has no relationship to this submission".to_string())
            })?;
        user.preferences = preferences;
        Ok(())
    }

    /// Users holding any of `relationships` who have at least one channel enabled.
    pub fn recipients(&self, relationships: &[Relationship]) -> Vec<AssociatedUser> {
        self.associated_users
            .iter()
            .filter(|u| u.preferences.any_enabled())
            .filter(|u| u.relationships.iter().any(|r| relationships.contains(r)))
            .cloned()
            .collect()
    }

    /// Authorship invariants that must hold after every committed write.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for user_id in self.author_user_ids() {
            if !seen.insert(user_id) {
                return Err(Error::DuplicateAuthor(format!(
                    "user {} is credited more than once",
                    user_id
                )));
            }
        }
        let mut orders: Vec<u32> = self.co_authors.iter().map(|a| a.order).collect();
        orders.sort_unstable();
        if orders.iter().enumerate().any(|(i, o)| *o != i as u32 + 1) {
            return Err(Error::InvalidOrder(
                "co-author order is not a contiguous 1..N sequence".to_string(),
            ));
        }
        Ok(())
    }
}
