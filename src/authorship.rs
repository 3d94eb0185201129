//! Authorship Registry: who is credited on a submission and who presents it.
//!
//! Every function here mutates a loaded `Submission` in place and either
//! succeeds completely or returns before touching it.

use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::directory::User;
use crate::error::{Error, Result};
use crate::submission::{
    Author, AuthorIdentity, AuthorKind, AuthorRole, Caller, DayAvailability, Operation,
    PresenterAvailability, Sponsor, Submission,
};

/// Payload for crediting a co-author: either a platform user id, or a name and institution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoAuthorInput {
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub institution: Option<String>,
    pub email: Option<String>,
    pub role: Option<AuthorRole>,
    #[serde(default)]
    pub is_student_author: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SponsorInput {
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub institution: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub role: Option<AuthorRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenterInput {
    pub author_id: Uuid,
    pub author_type: AuthorKind,
    #[serde(default)]
    pub is_primary: bool,
    pub role: Option<AuthorRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityInput {
    pub days: Vec<DayAvailability>,
    pub conflict_notes: Option<String>,
}

/// Builds the identity for a new credit. `linked` must be the directory
/// profile of `user_id` when one was given.
pub fn resolve_identity(
    user_id: Option<Uuid>,
    linked: Option<&User>,
    name: Option<&str>,
    institution: Option<&str>,
    email: Option<&str>,
) -> Result<AuthorIdentity> {
    match (user_id, linked) {
        (Some(_), Some(user)) => Ok(AuthorIdentity::Linked {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            affiliation: user.organization.clone(),
        }),
        (Some(id), None) => Err(Error::NotFound(format!("user {}", id))),
        (None, _) => {
            let name = non_blank(name)
                .ok_or_else(|| Error::Validation("external authors need a name".to_string()))?;
            let institution = non_blank(institution).ok_or_else(|| {
                Error::Validation("external authors need an institution".to_string())
            })?;
            Ok(AuthorIdentity::External {
                name,
                institution,
                email: non_blank(email),
            })
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn ensure_editable(submission: &Submission, op: Operation, caller: &Caller) -> Result<()> {
    op.ensure_allowed(submission.status)?;
    submission.ensure_corresponding_author_or_admin(caller)
}

pub fn add_co_author(
    submission: &mut Submission,
    caller: &Caller,
    identity: AuthorIdentity,
    role: Option<AuthorRole>,
    is_student_author: bool,
    is_known_collaborator: bool,
) -> Result<Author> {
    ensure_editable(submission, Operation::AddCoAuthor, caller)?;

    if let Some(user_id) = identity.user_id() {
        if submission.is_author(user_id) {
            return Err(Error::DuplicateAuthor(format!(
                "user {} is already credited on this submission",
                user_id
            )));
        }
    }

    let order = submission.co_authors.len() as u32 + 1;
    let mut author = Author::new(identity, role.unwrap_or(AuthorRole::CoAuthor), order);
    author.is_student_author = is_student_author;
    author.is_known_collaborator = is_known_collaborator && !author.identity.is_external();

    submission.co_authors.push(author.clone());
    submission.recompute_associated_users();
    Ok(author)
}

pub fn remove_co_author(
    submission: &mut Submission,
    caller: &Caller,
    author_id: Uuid,
) -> Result<Author> {
    ensure_editable(submission, Operation::RemoveCoAuthor, caller)?;

    let index = submission
        .co_authors
        .iter()
        .position(|a| a.id == author_id)
        .ok_or_else(|| Error::NotFound(format!("co-author {}", author_id)))?;

    let removed = submission.co_authors.remove(index);
    renumber(&mut submission.co_authors);
    submission.recompute_associated_users();
    Ok(removed)
}

/// `new_order` must name every existing co-author exactly once.
pub fn reorder_co_authors(
    submission: &mut Submission,
    caller: &Caller,
    new_order: &[Uuid],
) -> Result<()> {
    ensure_editable(submission, Operation::ReorderCoAuthors, caller)?;

    let existing: HashSet<Uuid> = submission.co_authors.iter().map(|a| a.id).collect();
    let requested: HashSet<Uuid> = new_order.iter().copied().collect();
    if requested.len() != new_order.len() {
        return Err(Error::InvalidOrder("order lists an author twice".to_string()));
    }
    if requested != existing {
        return Err(Error::InvalidOrder(format!(
            "order must contain exactly the {} current co-authors",
            existing.len()
        )));
    }

    for author in submission.co_authors.iter_mut() {
        if let Some(position) = new_order.iter().position(|id| *id == author.id) {
            author.order = position as u32 + 1;
        }
    }
    submission.co_authors.sort_by_key(|a| a.order);
    Ok(())
}

fn renumber(authors: &mut [Author]) {
    authors.sort_by_key(|a| a.order);
    for (i, author) in authors.iter_mut().enumerate() {
        author.order = i as u32 + 1;
    }
}

pub fn add_faculty_sponsor(
    submission: &mut Submission,
    caller: &Caller,
    identity: AuthorIdentity,
    linked: Option<&User>,
    department: Option<String>,
    role: Option<AuthorRole>,
) -> Result<Sponsor> {
    ensure_editable(submission, Operation::AddFacultySponsor, caller)?;

    if !submission.academic_level.is_student() {
        return Err(Error::Validation(
            "faculty sponsors are only recorded on student papers".to_string(),
        ));
    }

    let role = role.unwrap_or(AuthorRole::FacultySponsor);
    if !role.is_faculty() {
        return Err(Error::Validation(format!(
            "{:?} is not a faculty sponsorship role",
            role
        )));
    }

    if let Some(user_id) = identity.user_id() {
        match linked {
            Some(user) if user.has_academic_credential() => {}
            _ => {
                return Err(Error::IneligibleSponsor(format!(
                    "user {} holds no academic or reviewing credential",
                    user_id
                )))
            }
        }
        let already = submission
            .faculty_sponsors
            .iter()
            .any(|s| s.identity.user_id() == Some(user_id));
        if already {
            return Err(Error::DuplicateAuthor(format!(
                "user {} already sponsors this submission",
                user_id
            )));
        }
    }

    let sponsor = Sponsor {
        id: Uuid::new_v4(),
        identity,
        role,
        department: non_blank(department.as_deref()),
        added_at: chrono::Utc::now(),
    };
    submission.faculty_sponsors.push(sponsor.clone());
    submission.recompute_associated_users();
    Ok(sponsor)
}

pub fn remove_faculty_sponsor(
    submission: &mut Submission,
    caller: &Caller,
    sponsor_id: Uuid,
) -> Result<Sponsor> {
    ensure_editable(submission, Operation::RemoveFacultySponsor, caller)?;

    let index = submission
        .faculty_sponsors
        .iter()
        .position(|s| s.id == sponsor_id)
        .ok_or_else(|| Error::NotFound(format!("faculty sponsor {}", sponsor_id)))?;
    let removed = submission.faculty_sponsors.remove(index);
    submission.recompute_associated_users();
    Ok(removed)
}

pub fn designate_presenter(
    submission: &mut Submission,
    caller: &Caller,
    input: &PresenterInput,
) -> Result<Author> {
    Operation::DesignatePresenter.ensure_allowed(submission.status)?;
    submission.ensure_corresponding_author_or_admin(caller)?;

    if submission.author_mut(input.author_id, input.author_type).is_none() {
        return Err(Error::NotFound(format!(
            "{} {}",
            match input.author_type {
                AuthorKind::Corresponding => "corresponding author",
                AuthorKind::CoAuthor => "co-author",
            },
            input.author_id
        )));
    }

    if input.is_primary {
        submission.corresponding_author.is_primary_presenter = false;
        for author in submission.co_authors.iter_mut() {
            author.is_primary_presenter = false;
        }
    }

    let author = submission
        .author_mut(input.author_id, input.author_type)
        .ok_or_else(|| Error::NotFound(format!("author {}", input.author_id)))?;
    author.is_presenter = true;
    if input.is_primary {
        author.is_primary_presenter = true;
    }
    if let Some(role) = input.role {
        author.role = role;
    }
    Ok(author.clone())
}

pub fn remove_presenter(
    submission: &mut Submission,
    caller: &Caller,
    author_id: Uuid,
) -> Result<Author> {
    Operation::RemovePresenter.ensure_allowed(submission.status)?;
    submission.ensure_corresponding_author_or_admin(caller)?;

    let author = if submission.corresponding_author.id == author_id {
        &mut submission.corresponding_author
    } else {
        submission
            .co_authors
            .iter_mut()
            .find(|a| a.id == author_id)
            .ok_or_else(|| Error::NotFound(format!("author {}", author_id)))?
    };
    if !author.is_presenter {
        return Err(Error::NotFound(format!("presenter {}", author_id)));
    }
    author.is_presenter = false;
    author.is_primary_presenter = false;
    Ok(author.clone())
}

/// Replaces the presenters' scheduling availability. Any author may update it.
pub fn update_availability(
    submission: &mut Submission,
    caller: &Caller,
    input: AvailabilityInput,
) -> Result<PresenterAvailability> {
    Operation::UpdateAvailability.ensure_allowed(submission.status)?;
    submission.ensure_author_or_admin(caller)?;

    if input.days.is_empty() {
        return Err(Error::Validation(
            "availability needs at least one conference day".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for day in &input.days {
        let label = day.day.trim().to_lowercase();
        if label.is_empty() || !seen.insert(label) {
            return Err(Error::Validation(format!(
                "conference day '{}' is blank or repeated",
                day.day
            )));
        }
    }

    let availability = PresenterAvailability {
        days: input.days,
        conflict_notes: non_blank(input.conflict_notes.as_deref()),
        updated_at: chrono::Utc::now(),
        updated_by: caller.user_id,
    };
    submission.presentation_details.availability = Some(availability.clone());
    Ok(availability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Credential;
    use crate::submission::fixtures::{draft, draft_at_level, linked};
    use crate::submission::{AcademicLevel, SubmissionStatus};

    fn external(name: &str) -> AuthorIdentity {
        resolve_identity(None, None, Some(name), Some("Elsewhere College"), None).unwrap()
    }

    fn faculty_user(credentials: Vec<Credential>) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Prof Sponsor".to_string(),
            email: "sponsor@example.edu".to_string(),
            organization: Some("Example University".to_string()),
            department: Some("Finance".to_string()),
            expertise: vec![],
            credentials,
        }
    }

    #[test]
    fn test_resolve_identity_copies_linked_profile() {
        let user = faculty_user(vec![]);
        let identity = resolve_identity(Some(user.id), Some(&user), None, None, None).unwrap();
        assert_eq!(identity.user_id(), Some(user.id));
        assert_eq!(identity.name(), "Prof Sponsor");
        assert_eq!(identity.affiliation(), Some("Example University"));
    }

    #[test]
    fn test_resolve_identity_requires_external_fields() {
        let err = resolve_identity(None, None, Some("  "), Some("X"), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = resolve_identity(None, None, Some("Name"), None, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = resolve_identity(Some(Uuid::new_v4()), None, None, None, None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_add_co_author_assigns_next_order() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        let caller = Caller::user(owner);

        let first = add_co_author(&mut s, &caller, external("One"), None, false, false).unwrap();
        let second = add_co_author(&mut s, &caller, external("Two"), None, true, false).unwrap();

        assert_eq!(first.order, 1);
        assert_eq!(second.order, 2);
        assert!(second.is_student_author);
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn test_add_co_author_rejects_duplicate_user() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        let caller = Caller::user(owner);
        let other = Uuid::new_v4();

        add_co_author(&mut s, &caller, linked(other, "Other"), None, false, true).unwrap();
        let err =
            add_co_author(&mut s, &caller, linked(other, "Other"), None, false, true).unwrap_err();
        assert!(matches!(err, Error::DuplicateAuthor(_)));

        let err =
            add_co_author(&mut s, &caller, linked(owner, "Owner"), None, false, false).unwrap_err();
        assert!(matches!(err, Error::DuplicateAuthor(_)));
        assert_eq!(s.co_authors.len(), 1);
        assert!(s.associated_user(other).is_some());
    }

    #[test]
    fn test_only_corresponding_author_or_admin_edits() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        let stranger = Caller::user(Uuid::new_v4());
        let err = add_co_author(&mut s, &stranger, external("X"), None, false, false).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let admin = Caller::admin(Uuid::new_v4());
        assert!(add_co_author(&mut s, &admin, external("X"), None, false, false).is_ok());
    }

    #[test]
    fn test_authorship_frozen_under_review() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        s.status = SubmissionStatus::UnderReview;
        let err = add_co_author(&mut s, &Caller::user(owner), external("X"), None, false, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_remove_co_author_closes_order_gap() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        let caller = Caller::user(owner);
        let a = add_co_author(&mut s, &caller, external("A"), None, false, false).unwrap();
        add_co_author(&mut s, &caller, external("B"), None, false, false).unwrap();
        add_co_author(&mut s, &caller, external("C"), None, false, false).unwrap();

        remove_co_author(&mut s, &caller, a.id).unwrap();
        assert_eq!(
            s.co_authors.iter().map(|a| a.order).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(s.co_authors[0].identity.name(), "B");

        let err = remove_co_author(&mut s, &caller, a.id).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_reorder_applies_permutation() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        let caller = Caller::user(owner);
        let a = add_co_author(&mut s, &caller, external("A"), None, false, false).unwrap();
        let b = add_co_author(&mut s, &caller, external("B"), None, false, false).unwrap();
        let c = add_co_author(&mut s, &caller, external("C"), None, false, false).unwrap();

        reorder_co_authors(&mut s, &caller, &[c.id, a.id, b.id]).unwrap();
        let names: Vec<_> = s.co_authors.iter().map(|a| a.identity.name()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn test_reorder_non_permutation_leaves_order_untouched() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        let caller = Caller::user(owner);
        let a = add_co_author(&mut s, &caller, external("A"), None, false, false).unwrap();
        let b = add_co_author(&mut s, &caller, external("B"), None, false, false).unwrap();
        let before = s.co_authors.clone();

        let attempts: Vec<Vec<Uuid>> = vec![
            vec![a.id],
            vec![a.id, a.id],
            vec![a.id, b.id, Uuid::new_v4()],
            vec![b.id, Uuid::new_v4()],
            vec![],
        ];
        for attempt in attempts {
            let err = reorder_co_authors(&mut s, &caller, &attempt).unwrap_err();
            assert!(matches!(err, Error::InvalidOrder(_)));
            assert_eq!(s.co_authors, before);
        }
    }

    #[test]
    fn test_sponsors_only_on_student_papers() {
        let owner = Uuid::new_v4();
        let caller = Caller::user(owner);
        let user = faculty_user(vec![Credential::Faculty]);
        let identity = resolve_identity(Some(user.id), Some(&user), None, None, None).unwrap();

        let mut faculty_paper = draft(owner);
        let err = add_faculty_sponsor(
            &mut faculty_paper,
            &caller,
            identity.clone(),
            Some(&user),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let mut student_paper = draft_at_level(owner, AcademicLevel::Graduate);
        let sponsor =
            add_faculty_sponsor(&mut student_paper, &caller, identity, Some(&user), None, None)
                .unwrap();
        assert_eq!(sponsor.role, AuthorRole::FacultySponsor);
        assert!(student_paper.associated_user(user.id).is_some());
    }

    #[test]
    fn test_sponsor_without_credential_is_ineligible() {
        let owner = Uuid::new_v4();
        let mut s = draft_at_level(owner, AcademicLevel::Undergraduate);
        let user = faculty_user(vec![Credential::Student]);
        let identity = resolve_identity(Some(user.id), Some(&user), None, None, None).unwrap();

        let err = add_faculty_sponsor(&mut s, &Caller::user(owner), identity, Some(&user), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::IneligibleSponsor(_)));
        assert!(s.faculty_sponsors.is_empty());
    }

    #[test]
    fn test_external_sponsor_and_removal() {
        let owner = Uuid::new_v4();
        let caller = Caller::user(owner);
        let mut s = draft_at_level(owner, AcademicLevel::Doctoral);
        let sponsor = add_faculty_sponsor(
            &mut s,
            &caller,
            external("Dr Outside"),
            None,
            Some("Economics".to_string()),
            Some(AuthorRole::FacultyAdvisor),
        )
        .unwrap();
        assert_eq!(sponsor.department.as_deref(), Some("Economics"));

        remove_faculty_sponsor(&mut s, &caller, sponsor.id).unwrap();
        assert!(s.faculty_sponsors.is_empty());
        let err = remove_faculty_sponsor(&mut s, &caller, sponsor.id).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_designate_presenter_discriminates_author_kind() {
        let owner = Uuid::new_v4();
        let caller = Caller::user(owner);
        let mut s = draft(owner);
        let co = add_co_author(&mut s, &caller, external("Co"), None, false, false).unwrap();

        // A co-author id looked up as the corresponding author does not resolve.
        let err = designate_presenter(
            &mut s,
            &caller,
            &PresenterInput {
                author_id: co.id,
                author_type: AuthorKind::Corresponding,
                is_primary: true,
                role: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!s.co_authors[0].is_presenter);

        let owner_author_id = s.corresponding_author.id;
        designate_presenter(
            &mut s,
            &caller,
            &PresenterInput {
                author_id: owner_author_id,
                author_type: AuthorKind::Corresponding,
                is_primary: true,
                role: None,
            },
        )
        .unwrap();
        designate_presenter(
            &mut s,
            &caller,
            &PresenterInput {
                author_id: co.id,
                author_type: AuthorKind::CoAuthor,
                is_primary: true,
                role: Some(AuthorRole::StudentResearcher),
            },
        )
        .unwrap();

        assert!(s.corresponding_author.is_presenter);
        assert!(!s.corresponding_author.is_primary_presenter);
        assert!(s.co_authors[0].is_primary_presenter);
        assert_eq!(s.co_authors[0].role, AuthorRole::StudentResearcher);

        remove_presenter(&mut s, &caller, co.id).unwrap();
        assert!(!s.co_authors[0].is_presenter);
        let err = remove_presenter(&mut s, &caller, co.id).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_availability_rejects_repeated_days() {
        let owner = Uuid::new_v4();
        let mut s = draft(owner);
        let day = |d: &str| DayAvailability {
            day: d.to_string(),
            morning: true,
            afternoon: false,
            evening: false,
        };

        let err = update_availability(
            &mut s,
            &Caller::user(owner),
            AvailabilityInput {
                days: vec![day("Thursday"), day("thursday")],
                conflict_notes: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(s.presentation_details.availability.is_none());

        let saved = update_availability(
            &mut s,
            &Caller::user(owner),
            AvailabilityInput {
                days: vec![day("Wednesday"), day("Thursday")],
                conflict_notes: Some("Teaching Friday morning".to_string()),
            },
        )
        .unwrap();
        assert_eq!(saved.days.len(), 2);
        assert_eq!(s.presentation_details.availability, Some(saved));

        let err = update_availability(
            &mut s,
            &Caller::user(Uuid::new_v4()),
            AvailabilityInput {
                days: vec![day("Friday")],
                conflict_notes: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
