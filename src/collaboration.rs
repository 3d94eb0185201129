//! Collaboration Ranker: co-author search that puts prior collaborators first.
//!
//! Known collaborators (at least one shared submission with the searcher)
//! always precede other matches, ordered by shared-submission count; the
//! other matches keep the directory's order.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::directory::User;
use crate::error::{Error, Result};

pub const MIN_QUERY_CHARS: usize = 2;
pub const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(alias = "q")]
    pub query: String,
    pub exclude_submission: Option<Uuid>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub user: User,
    pub is_known_collaborator: bool,
    pub shared_submissions: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidatePage {
    pub candidates: Vec<Candidate>,
    pub page: u32,
    pub limit: u32,
    /// Ranked matches before pagination and submission exclusion
    pub total: usize,
}

pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_CHARS {
        return Err(Error::InvalidQuery(format!(
            "search terms need at least {} characters",
            MIN_QUERY_CHARS
        )));
    }
    Ok(trimmed)
}

/// Orders `matches` known-collaborators-first. `counts` maps co-author user
/// ids to the number of submissions they share with `current_user`.
pub fn rank(matches: Vec<User>, current_user: Uuid, counts: &HashMap<Uuid, u32>) -> Vec<Candidate> {
    let (mut known, others): (Vec<Candidate>, Vec<Candidate>) = matches
        .into_iter()
        .filter(|u| u.id != current_user)
        .map(|user| {
            let shared = counts.get(&user.id).copied().unwrap_or(0);
            Candidate {
                user,
                is_known_collaborator: shared > 0,
                shared_submissions: shared,
            }
        })
        .partition(|c| c.is_known_collaborator);

    // Stable sort keeps directory order among equal counts.
    known.sort_by(|a, b| b.shared_submissions.cmp(&a.shared_submissions));
    known.extend(others);
    known
}

/// One page of `ranked`; `page` is 1-indexed and `limit` is clamped to `1..=max_limit`.
pub fn paginate(
    ranked: Vec<Candidate>,
    page: u32,
    limit: u32,
    max_limit: u32,
) -> (Vec<Candidate>, u32, u32) {
    let page = page.max(1);
    let limit = limit.clamp(1, max_limit.max(1));
    let offset = (page as usize - 1) * limit as usize;
    let items = ranked
        .into_iter()
        .skip(offset)
        .take(limit as usize)
        .collect();
    (items, page, limit)
}

pub fn search(
    matches: Vec<User>,
    current_user: Uuid,
    counts: &HashMap<Uuid, u32>,
    credited: Option<&HashSet<Uuid>>,
    page: u32,
    limit: u32,
    max_limit: u32,
) -> CandidatePage {
    let ranked = rank(matches, current_user, counts);
    let total = ranked.len();
    let (mut candidates, page, limit) = paginate(ranked, page, limit, max_limit);
    // Exclusion runs after pagination, so a page can come back short.
    if let Some(credited) = credited {
        candidates.retain(|c| !credited.contains(&c.user.id));
    }
    CandidatePage {
        candidates,
        page,
        limit,
        total,
    }
}
