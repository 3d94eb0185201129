//! User Directory and Conference Registry collaborators

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    Student,
    Faculty,
    Reviewer,
    Editor,
}

impl FromStr for Credential {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "student" => Ok(Credential::Student),
            "faculty" => Ok(Credential::Faculty),
            "reviewer" => Ok(Credential::Reviewer),
            "editor" => Ok(Credential::Editor),
            other => Err(Error::Validation(format!("unknown credential '{}'", other))),
        }
    }
}

/// A platform user profile as the directory currently knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub organization: Option<String>,
    pub department: Option<String>,
    pub expertise: Vec<String>,
    pub credentials: Vec<Credential>,
}

impl User {
    /// Faculty and reviewing credentials qualify a user to sponsor student work.
    pub fn has_academic_credential(&self) -> bool {
        self.credentials
            .iter()
            .any(|c| matches!(c, Credential::Faculty | Credential::Reviewer | Credential::Editor))
    }

    /// Case-insensitive substring match over the searchable profile fields.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        let hit = |field: &str| field.to_lowercase().contains(&needle);
        hit(self.name.as_str())
            || hit(self.email.as_str())
            || self.organization.as_deref().map_or(false, hit)
            || self.department.as_deref().map_or(false, hit)
            || self.expertise.iter().any(|e| hit(e.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conference {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    pub submission_deadline: DateTime<Utc>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user(&self, id: Uuid) -> Result<Option<User>>;

    /// Users matching `query`, in the directory's natural order.
    async fn search(&self, query: &str) -> Result<Vec<User>>;
}

#[async_trait]
pub trait ConferenceRegistry: Send + Sync {
    async fn conference(&self, id: Uuid) -> Result<Option<Conference>>;
}

/// In-process directory, populated by whoever embeds the engine.
#[derive(Clone, Default)]
pub struct StaticDirectory {
    users: Arc<RwLock<Vec<User>>>,
    conferences: Arc<RwLock<HashMap<Uuid, Conference>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        let mut users = self.users.write().await;
        users.retain(|u| u.id != user.id);
        users.push(user);
    }

    pub async fn add_conference(&self, conference: Conference) {
        self.conferences
            .write()
            .await
            .insert(conference.id, conference);
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn search(&self, query: &str) -> Result<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| u.matches(query))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConferenceRegistry for StaticDirectory {
    async fn conference(&self, id: Uuid) -> Result<Option<Conference>> {
        Ok(self.conferences.read().await.get(&id).cloned())
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    organization: Option<String>,
    department: Option<String>,
    expertise: Vec<String>,
    credentials: Vec<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            organization: row.organization,
            department: row.department,
            expertise: row.expertise,
            credentials: row
                .credentials
                .iter()
                .filter_map(|c| c.parse().ok())
                .collect(),
        }
    }
}

#[derive(Debug, FromRow)]
struct ConferenceRow {
    id: Uuid,
    name: String,
    year: i32,
    submission_deadline: DateTime<Utc>,
}

/// Reads the platform's shared `users` and `conferences` tables.
#[derive(Clone)]
pub struct PgDirectory {
    pool: Arc<PgPool>,
}

impl PgDirectory {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, organization, department, expertise, credentials
            FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(row.map(User::from))
    }

    async fn search(&self, query: &str) -> Result<Vec<User>> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, organization, department, expertise, credentials
            FROM users
            WHERE name ILIKE $1
               OR email ILIKE $1
               OR organization ILIKE $1
               OR department ILIKE $1
               OR EXISTS (SELECT 1 FROM unnest(expertise) AS e WHERE e ILIKE $1)
            ORDER BY name
            "#,
        )
        .bind(pattern)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}

#[async_trait]
impl ConferenceRegistry for PgDirectory {
    async fn conference(&self, id: Uuid) -> Result<Option<Conference>> {
        let row = sqlx::query_as::<_, ConferenceRow>(
            "SELECT id, name, year, submission_deadline FROM conferences WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(row.map(|r| Conference {
            id: r.id,
            name: r.name,
            year: r.year,
            submission_deadline: r.submission_deadline,
        }))
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
