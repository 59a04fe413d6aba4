use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueState::Open => "OPEN",
            IssueState::Closed => "CLOSED",
        }
    }

    /// Maps GitHub's lowercase wire state onto the local representation.
    pub fn from_remote(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("open") {
            IssueState::Open
        } else {
            IssueState::Closed
        }
    }

    pub fn to_remote(self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

impl FromStr for IssueState {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(IssueState::Open),
            "CLOSED" => Ok(IssueState::Closed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    None,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
            Priority::None => "NONE",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Priority::Critical),
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            "NONE" => Ok(Priority::None),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum Role {
    Admin,
    Manager,
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Member => "MEMBER",
            Role::Viewer => "VIEWER",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            "MEMBER" => Ok(Role::Member),
            "VIEWER" => Ok(Role::Viewer),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum NotificationKind {
    IssueCreated,
    IssueAssigned,
    IssueMoved,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::IssueCreated => "ISSUE_CREATED",
            NotificationKind::IssueAssigned => "ISSUE_ASSIGNED",
            NotificationKind::IssueMoved => "ISSUE_MOVED",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ISSUE_CREATED" => Ok(NotificationKind::IssueCreated),
            "ISSUE_ASSIGNED" => Ok(NotificationKind::IssueAssigned),
            "ISSUE_MOVED" => Ok(NotificationKind::IssueMoved),
            _ => Err(()),
        }
    }
}

/// Tags imported from GitHub labels carry the `github` category so they can
/// be told apart from locally authored tags.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum TagCategory {
    Github,
    Custom(String),
}

impl TagCategory {
    pub fn as_str(&self) -> &str {
        match self {
            TagCategory::Github => "github",
            TagCategory::Custom(name) => name.as_str(),
        }
    }

    pub fn from_raw(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("github") {
            TagCategory::Github
        } else {
            TagCategory::Custom(raw.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub id: Uuid,
    /// Remote issue number. Unique and immutable once set; the sole
    /// correlation key between the local row and the GitHub issue.
    pub github_number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: IssueState,
    pub priority: Priority,
    pub board_column: String,
    pub board_position: i64,
    pub remote_url: Option<String>,
    pub due_date: Option<String>,
    pub estimated_hours: Option<f64>,
    pub synced_at: Option<String>,
    pub author_id: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub description: Option<String>,
    pub category: TagCategory,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: String,
}

/// The slice of a user exposed on issue relations and notifications.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub issue_id: Option<Uuid>,
    pub read: bool,
    pub created_at: String,
}

/// An issue with its association sets expanded, as returned by the read
/// surface and consumed by the board store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueDetails {
    pub issue: Issue,
    pub tags: Vec<Tag>,
    pub groups: Vec<Group>,
    pub assignees: Vec<UserSummary>,
}

/// The active remote repository. Empty owner or repo means "unconfigured"
/// and callers must short-circuit remote calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct RepoConfig {
    pub owner: String,
    pub repo: String,
}

impl RepoConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty()
    }
}
