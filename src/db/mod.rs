use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params, types::Type};
use uuid::Uuid;

use crate::types::{
    Group, Issue, IssueDetails, IssueState, Notification, NotificationKind, Priority, Role, Tag,
    TagCategory, User, UserSummary,
};

pub const DEFAULT_BOARD_COLUMN: &str = "backlog";
pub const DONE_BOARD_COLUMN: &str = "done";

/// Row inputs for a locally created issue. The remote issue must already
/// exist; `github_number` comes from its response.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub github_number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: IssueState,
    pub priority: Priority,
    pub board_column: String,
    pub board_position: i64,
    pub remote_url: Option<String>,
    pub author_id: Option<Uuid>,
}

/// Partial issue update. `None` leaves the column untouched; the nested
/// options on `due_date`/`estimated_hours` distinguish "clear" from "keep".
#[derive(Debug, Clone, Default)]
pub struct IssueChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<IssueState>,
    pub priority: Option<Priority>,
    pub board_column: Option<String>,
    pub board_position: Option<i64>,
    pub due_date: Option<Option<String>>,
    pub estimated_hours: Option<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub issue_id: Option<Uuid>,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();

        if path_ref != Path::new(":memory:")
            && let Some(parent) = path_ref.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create parent directories for {}",
                    path_ref.display()
                )
            })?;
        }

        let conn = Connection::open(path_ref)
            .with_context(|| format!("failed to open sqlite db at {}", path_ref.display()))?;

        conn.execute("PRAGMA foreign_keys = ON", params![])
            .context("failed to enable foreign keys")?;

        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    // ---- settings -------------------------------------------------------

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("failed to upsert setting {key}"))?;
        Ok(())
    }

    // ---- users ----------------------------------------------------------

    pub fn add_user(
        &self,
        email: impl AsRef<str>,
        username: impl AsRef<str>,
        password_hash: impl AsRef<str>,
        name: Option<String>,
        role: Role,
    ) -> Result<User> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO users (id, email, username, password_hash, name, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    email.as_ref(),
                    username.as_ref(),
                    password_hash.as_ref(),
                    name,
                    role.as_str(),
                    now_iso()
                ],
            )
            .context("failed to insert user")?;
        self.get_user(id)
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, email, username, password_hash, name, role, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                map_user_row,
            )
            .with_context(|| format!("user {id} not found"))
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, username, password_hash, name, role, created_at
             FROM users WHERE username = ?1",
        )?;
        let mut rows = stmt.query_map(params![username], map_user_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to load user by username")?)),
            None => Ok(None),
        }
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, username, password_hash, name, role, created_at
             FROM users ORDER BY created_at ASC",
        )?;
        let users = stmt
            .query_map(params![], map_user_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load users")?;
        Ok(users)
    }

    pub fn user_ids_excluding(&self, exclude: Option<Uuid>) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn.prepare("SELECT id FROM users")?;
        let ids = stmt
            .query_map(params![], |row| parse_uuid_column(row.get(0)?, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load user ids")?;
        Ok(ids
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .collect())
    }

    // ---- groups ---------------------------------------------------------

    pub fn add_group(
        &self,
        name: impl AsRef<str>,
        color: impl AsRef<str>,
        description: Option<String>,
    ) -> Result<Group> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO groups (id, name, color, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    name.as_ref(),
                    color.as_ref(),
                    description,
                    now_iso()
                ],
            )
            .context("failed to insert group")?;
        self.get_group(id)
    }

    pub fn get_group(&self, id: Uuid) -> Result<Group> {
        self.conn
            .query_row(
                "SELECT id, name, color, description, created_at FROM groups WHERE id = ?1",
                params![id.to_string()],
                map_group_row,
            )
            .with_context(|| format!("group {id} not found"))
    }

    pub fn find_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color, description, created_at FROM groups WHERE name = ?1")?;
        let mut rows = stmt.query_map(params![name], map_group_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to load group by name")?)),
            None => Ok(None),
        }
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, color, description, created_at FROM groups ORDER BY name ASC",
        )?;
        let groups = stmt
            .query_map(params![], map_group_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load groups")?;
        Ok(groups)
    }

    pub fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
                params![group_id.to_string(), user_id.to_string()],
            )
            .context("failed to insert group member")?;
        Ok(())
    }

    pub fn group_member_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM group_members WHERE group_id = ?1")?;
        let ids = stmt
            .query_map(params![group_id.to_string()], |row| {
                parse_uuid_column(row.get(0)?, 0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load group members")?;
        Ok(ids)
    }

    // ---- tags -----------------------------------------------------------

    pub fn add_tag(
        &self,
        name: impl AsRef<str>,
        color: impl AsRef<str>,
        description: Option<String>,
        category: TagCategory,
    ) -> Result<Tag> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO tags (id, name, color, description, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    name.as_ref(),
                    color.as_ref(),
                    description,
                    category.as_str(),
                    now_iso()
                ],
            )
            .context("failed to insert tag")?;
        self.get_tag(id)
    }

    /// Concurrent syncs can race to create the same tag name; the UNIQUE
    /// constraint on `tags.name` is the safety net, and the loser falls
    /// back to looking the winner up.
    pub fn create_or_get_tag(
        &self,
        name: &str,
        color: &str,
        description: Option<String>,
        category: TagCategory,
    ) -> Result<Tag> {
        match self.add_tag(name, color, description, category) {
            Ok(tag) => Ok(tag),
            Err(err) => {
                if is_unique_violation(&err) {
                    self.find_tag_by_name(name)?
                        .ok_or_else(|| anyhow!("tag {name} vanished after unique violation"))
                } else {
                    Err(err)
                }
            }
        }
    }

    pub fn get_tag(&self, id: Uuid) -> Result<Tag> {
        self.conn
            .query_row(
                "SELECT id, name, color, description, category, created_at
                 FROM tags WHERE id = ?1",
                params![id.to_string()],
                map_tag_row,
            )
            .with_context(|| format!("tag {id} not found"))
    }

    /// Case-sensitive name lookup (tag names are case-sensitively unique).
    pub fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, color, description, category, created_at
             FROM tags WHERE name = ?1",
        )?;
        let mut rows = stmt.query_map(params![name], map_tag_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to load tag by name")?)),
            None => Ok(None),
        }
    }

    /// Issue links go with the tag via ON DELETE CASCADE.
    pub fn delete_tag(&self, id: Uuid) -> Result<()> {
        self.conn
            .execute("DELETE FROM tags WHERE id = ?1", params![id.to_string()])
            .context("failed to delete tag")?;
        Ok(())
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, color, description, category, created_at
             FROM tags ORDER BY name ASC",
        )?;
        let tags = stmt
            .query_map(params![], map_tag_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load tags")?;
        Ok(tags)
    }

    // ---- issues ---------------------------------------------------------

    pub fn create_issue(&self, new_issue: &NewIssue) -> Result<Issue> {
        let id = Uuid::new_v4();
        let now = now_iso();
        self.conn
            .execute(
                "INSERT INTO issues (
                    id, github_number, title, body, state, priority, board_column,
                    board_position, remote_url, due_date, estimated_hours, synced_at,
                    author_id, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    id.to_string(),
                    new_issue.github_number,
                    new_issue.title,
                    new_issue.body,
                    new_issue.state.as_str(),
                    new_issue.priority.as_str(),
                    new_issue.board_column,
                    new_issue.board_position,
                    new_issue.remote_url,
                    Option::<String>::None,
                    Option::<f64>::None,
                    now,
                    new_issue.author_id.map(|id| id.to_string()),
                    now,
                    now
                ],
            )
            .context("failed to insert issue")?;
        self.get_issue(id)
    }

    pub fn get_issue(&self, id: Uuid) -> Result<Issue> {
        self.conn
            .query_row(
                &format!("{ISSUE_SELECT} WHERE id = ?1"),
                params![id.to_string()],
                map_issue_row,
            )
            .with_context(|| format!("issue {id} not found"))
    }

    pub fn find_issue_by_id(&self, id: Uuid) -> Result<Option<Issue>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ISSUE_SELECT} WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id.to_string()], map_issue_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to load issue by id")?)),
            None => Ok(None),
        }
    }

    pub fn find_issue_by_number(&self, github_number: i64) -> Result<Option<Issue>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ISSUE_SELECT} WHERE github_number = ?1"))?;
        let mut rows = stmt.query_map(params![github_number], map_issue_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to load issue by number")?)),
            None => Ok(None),
        }
    }

    pub fn list_issues(&self) -> Result<Vec<Issue>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ISSUE_SELECT} ORDER BY github_number DESC"))?;
        let issues = stmt
            .query_map(params![], map_issue_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load issues")?;
        Ok(issues)
    }

    /// Upsert a row from a remote issue, keyed by `github_number`.
    ///
    /// An existing row keeps its board placement, priority, due date and
    /// estimate; only the remote-backed columns and `synced_at` are
    /// refreshed. A new row gets board defaults derived from the remote
    /// state and priority Medium.
    pub fn upsert_remote_issue(
        &self,
        github_number: i64,
        title: &str,
        body: Option<&str>,
        state: IssueState,
        remote_url: &str,
    ) -> Result<Issue> {
        let now = now_iso();
        match self.find_issue_by_number(github_number)? {
            Some(existing) => {
                self.conn
                    .execute(
                        "UPDATE issues
                         SET title = ?1, body = ?2, state = ?3, remote_url = ?4,
                             synced_at = ?5, updated_at = ?6
                         WHERE github_number = ?7",
                        params![
                            title,
                            body,
                            state.as_str(),
                            remote_url,
                            now,
                            now,
                            github_number
                        ],
                    )
                    .context("failed to refresh issue from remote")?;
                self.get_issue(existing.id)
            }
            None => {
                let board_column = match state {
                    IssueState::Open => DEFAULT_BOARD_COLUMN,
                    IssueState::Closed => DONE_BOARD_COLUMN,
                };
                self.create_issue(&NewIssue {
                    github_number,
                    title: title.to_string(),
                    body: body.map(str::to_string),
                    state,
                    priority: Priority::Medium,
                    board_column: board_column.to_string(),
                    board_position: 0,
                    remote_url: Some(remote_url.to_string()),
                    author_id: None,
                })
            }
        }
    }

    /// Delete every local issue whose `github_number` is not in `present`.
    /// An empty `present` deletes all issues; callers must validate the
    /// repository configuration before syncing.
    pub fn delete_issues_absent_from(&self, present: &[i64]) -> Result<usize> {
        if present.is_empty() {
            let deleted = self
                .conn
                .execute("DELETE FROM issues", params![])
                .context("failed to clear issues")?;
            return Ok(deleted);
        }

        let placeholders = vec!["?"; present.len()].join(", ");
        let sql = format!("DELETE FROM issues WHERE github_number NOT IN ({placeholders})");
        let deleted = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(present.iter()))
            .context("failed to delete absent issues")?;
        Ok(deleted)
    }

    pub fn update_issue(&self, id: Uuid, changes: &IssueChanges) -> Result<Issue> {
        let current = self.get_issue(id)?;

        let title = changes.title.clone().unwrap_or(current.title);
        let body = changes.body.clone().or(current.body);
        let state = changes.state.unwrap_or(current.state);
        let priority = changes.priority.unwrap_or(current.priority);
        let board_column = changes
            .board_column
            .clone()
            .unwrap_or(current.board_column);
        let board_position = changes.board_position.unwrap_or(current.board_position);
        let due_date = match &changes.due_date {
            Some(value) => value.clone(),
            None => current.due_date,
        };
        let estimated_hours = match changes.estimated_hours {
            Some(value) => value,
            None => current.estimated_hours,
        };

        self.conn
            .execute(
                "UPDATE issues
                 SET title = ?1, body = ?2, state = ?3, priority = ?4, board_column = ?5,
                     board_position = ?6, due_date = ?7, estimated_hours = ?8, updated_at = ?9
                 WHERE id = ?10",
                params![
                    title,
                    body,
                    state.as_str(),
                    priority.as_str(),
                    board_column,
                    board_position,
                    due_date,
                    estimated_hours,
                    now_iso(),
                    id.to_string()
                ],
            )
            .context("failed to update issue")?;
        self.get_issue(id)
    }

    pub fn delete_issue(&self, id: Uuid) -> Result<()> {
        self.conn
            .execute("DELETE FROM issues WHERE id = ?1", params![id.to_string()])
            .context("failed to delete issue")?;
        Ok(())
    }

    // ---- associations ---------------------------------------------------

    /// Full-replacement update: drops every existing link for the issue and
    /// inserts the given set inside one transaction, so no reader observes
    /// a half-updated association set.
    pub fn replace_issue_tags(&self, issue_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        self.replace_links("issue_tags", "tag_id", issue_id, tag_ids)
            .context("failed to replace issue tags")
    }

    pub fn replace_issue_groups(&self, issue_id: Uuid, group_ids: &[Uuid]) -> Result<()> {
        self.replace_links("issue_groups", "group_id", issue_id, group_ids)
            .context("failed to replace issue groups")
    }

    pub fn replace_issue_assignees(&self, issue_id: Uuid, user_ids: &[Uuid]) -> Result<()> {
        self.replace_links("issue_assignees", "user_id", issue_id, user_ids)
            .context("failed to replace issue assignees")
    }

    fn replace_links(
        &self,
        table: &str,
        column: &str,
        issue_id: Uuid,
        ids: &[Uuid],
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!("DELETE FROM {table} WHERE issue_id = ?1"),
            params![issue_id.to_string()],
        )?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {table} (issue_id, {column}) VALUES (?1, ?2)"
            ))?;
            for id in ids {
                stmt.execute(params![issue_id.to_string(), id.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn tags_for_issue(&self, issue_id: Uuid) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, t.color, t.description, t.category, t.created_at
             FROM tags t JOIN issue_tags it ON it.tag_id = t.id
             WHERE it.issue_id = ?1 ORDER BY t.name ASC",
        )?;
        let tags = stmt
            .query_map(params![issue_id.to_string()], map_tag_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load issue tags")?;
        Ok(tags)
    }

    pub fn groups_for_issue(&self, issue_id: Uuid) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.name, g.color, g.description, g.created_at
             FROM groups g JOIN issue_groups ig ON ig.group_id = g.id
             WHERE ig.issue_id = ?1 ORDER BY g.name ASC",
        )?;
        let groups = stmt
            .query_map(params![issue_id.to_string()], map_group_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load issue groups")?;
        Ok(groups)
    }

    pub fn assignees_for_issue(&self, issue_id: Uuid) -> Result<Vec<UserSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.username, u.name
             FROM users u JOIN issue_assignees ia ON ia.user_id = u.id
             WHERE ia.issue_id = ?1 ORDER BY u.username ASC",
        )?;
        let assignees = stmt
            .query_map(params![issue_id.to_string()], |row| {
                Ok(UserSummary {
                    id: parse_uuid_column(row.get::<_, String>(0)?, 0)?,
                    username: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load issue assignees")?;
        Ok(assignees)
    }

    pub fn assignee_ids_for_issue(&self, issue_id: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM issue_assignees WHERE issue_id = ?1")?;
        let ids = stmt
            .query_map(params![issue_id.to_string()], |row| {
                parse_uuid_column(row.get(0)?, 0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load assignee ids")?;
        Ok(ids)
    }

    pub fn issue_details(&self, id: Uuid) -> Result<IssueDetails> {
        let issue = self.get_issue(id)?;
        self.expand_issue(issue)
    }

    pub fn list_issue_details(&self) -> Result<Vec<IssueDetails>> {
        self.list_issues()?
            .into_iter()
            .map(|issue| self.expand_issue(issue))
            .collect()
    }

    fn expand_issue(&self, issue: Issue) -> Result<IssueDetails> {
        let tags = self.tags_for_issue(issue.id)?;
        let groups = self.groups_for_issue(issue.id)?;
        let assignees = self.assignees_for_issue(issue.id)?;
        Ok(IssueDetails {
            issue,
            tags,
            groups,
            assignees,
        })
    }

    // ---- notifications --------------------------------------------------

    pub fn insert_notifications(&self, notifications: &[NewNotification]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notifications (id, user_id, kind, title, message, issue_id, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            )?;
            for notification in notifications {
                stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    notification.user_id.to_string(),
                    notification.kind.as_str(),
                    notification.title,
                    notification.message,
                    notification.issue_id.map(|id| id.to_string()),
                    now_iso()
                ])?;
            }
        }
        tx.commit().context("failed to insert notifications")?;
        Ok(notifications.len())
    }

    pub fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, kind, title, message, issue_id, is_read, created_at
             FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let notifications = stmt
            .query_map(params![user_id.to_string()], map_notification_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load notifications")?;
        Ok(notifications)
    }

    pub fn mark_notification_read(&self, id: Uuid) -> Result<()> {
        self.conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1",
                params![id.to_string()],
            )
            .context("failed to mark notification read")?;
        Ok(())
    }

    // ---- migrations -----------------------------------------------------

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    username TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    name TEXT,
                    role TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS issues (
                    id TEXT PRIMARY KEY,
                    github_number INTEGER NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    body TEXT,
                    state TEXT NOT NULL,
                    priority TEXT NOT NULL,
                    board_column TEXT NOT NULL DEFAULT 'backlog',
                    board_position INTEGER NOT NULL DEFAULT 0,
                    remote_url TEXT,
                    due_date TEXT,
                    estimated_hours REAL,
                    synced_at TEXT,
                    author_id TEXT REFERENCES users(id),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tags (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    color TEXT NOT NULL,
                    description TEXT,
                    category TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS groups (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    color TEXT NOT NULL,
                    description TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS issue_tags (
                    issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    UNIQUE(issue_id, tag_id)
                );

                CREATE TABLE IF NOT EXISTS issue_groups (
                    issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                    UNIQUE(issue_id, group_id)
                );

                CREATE TABLE IF NOT EXISTS issue_assignees (
                    issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    UNIQUE(issue_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS group_members (
                    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    UNIQUE(group_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS notifications (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    kind TEXT NOT NULL,
                    title TEXT NOT NULL,
                    message TEXT,
                    issue_id TEXT REFERENCES issues(id) ON DELETE CASCADE,
                    is_read INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );",
            )
            .context("failed to run sqlite migrations")?;

        self.conn
            .execute(
                "ALTER TABLE issues ADD COLUMN estimated_hours REAL",
                params![],
            )
            .or_else(|err| {
                if is_duplicate_column_err(&err) {
                    Ok(0)
                } else {
                    Err(err)
                }
            })
            .context("failed to migrate issues.estimated_hours")?;

        Ok(())
    }
}

const ISSUE_SELECT: &str = "SELECT id, github_number, title, body, state, priority, board_column,
        board_position, remote_url, due_date, estimated_hours, synced_at, author_id,
        created_at, updated_at FROM issues";

fn map_issue_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: parse_uuid_column(row.get::<_, String>(0)?, 0)?,
        github_number: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        state: parse_enum_column(row.get::<_, String>(4)?, 4)?,
        priority: parse_enum_column(row.get::<_, String>(5)?, 5)?,
        board_column: row.get(6)?,
        board_position: row.get(7)?,
        remote_url: row.get(8)?,
        due_date: row.get(9)?,
        estimated_hours: row.get(10)?,
        synced_at: row.get(11)?,
        author_id: row
            .get::<_, Option<String>>(12)?
            .map(|raw| parse_uuid_column(raw, 12))
            .transpose()?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn map_tag_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: parse_uuid_column(row.get::<_, String>(0)?, 0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        description: row.get(3)?,
        category: TagCategory::from_raw(&row.get::<_, String>(4)?),
        created_at: row.get(5)?,
    })
}

fn map_group_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: parse_uuid_column(row.get::<_, String>(0)?, 0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid_column(row.get::<_, String>(0)?, 0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        name: row.get(4)?,
        role: parse_enum_column(row.get::<_, String>(5)?, 5)?,
        created_at: row.get(6)?,
    })
}

fn map_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: parse_uuid_column(row.get::<_, String>(0)?, 0)?,
        user_id: parse_uuid_column(row.get::<_, String>(1)?, 1)?,
        kind: parse_enum_column(row.get::<_, String>(2)?, 2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        issue_id: row
            .get::<_, Option<String>>(5)?
            .map(|raw| parse_uuid_column(raw, 5))
            .transpose()?,
        read: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
    })
}

fn is_duplicate_column_err(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("duplicate column name")
    )
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(inner, _))
                if inner.code == rusqlite::ErrorCode::ConstraintViolation
        )
    })
}

fn parse_uuid_column(value: String, idx: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn parse_enum_column<T: FromStr<Err = ()>>(value: String, idx: usize) -> rusqlite::Result<T> {
    T::from_str(&value).map_err(|()| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized value '{value}'").into(),
        )
    })
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn open_db() -> Result<Database> {
        Database::open(":memory:")
    }

    #[test]
    fn test_open_creates_database_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("issueboard.sqlite");
        let _db = Database::open(&path)?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_settings_upsert() -> Result<()> {
        let db = open_db()?;
        assert_eq!(db.get_setting("github_repo")?, None);

        db.set_setting("github_repo", "{\"owner\":\"a\",\"repo\":\"b\"}")?;
        db.set_setting("github_repo", "{\"owner\":\"c\",\"repo\":\"d\"}")?;
        assert_eq!(
            db.get_setting("github_repo")?.as_deref(),
            Some("{\"owner\":\"c\",\"repo\":\"d\"}")
        );
        Ok(())
    }

    #[test]
    fn test_user_crud_and_unique_constraints() -> Result<()> {
        let db = open_db()?;
        let user = db.add_user("a@example.com", "alice", "hash", None, Role::Admin)?;
        assert_eq!(user.role, Role::Admin);

        let duplicate_email = db.add_user("a@example.com", "bob", "hash", None, Role::Member);
        assert!(duplicate_email.is_err());

        let duplicate_username = db.add_user("b@example.com", "alice", "hash", None, Role::Member);
        assert!(duplicate_username.is_err());

        let users = db.list_users()?;
        assert_eq!(users.len(), 1);
        Ok(())
    }

    #[test]
    fn test_user_ids_excluding() -> Result<()> {
        let db = open_db()?;
        let alice = db.add_user("a@example.com", "alice", "hash", None, Role::Member)?;
        let bob = db.add_user("b@example.com", "bob", "hash", None, Role::Member)?;

        let ids = db.user_ids_excluding(Some(alice.id))?;
        assert_eq!(ids, vec![bob.id]);

        let all = db.user_ids_excluding(None)?;
        assert_eq!(all.len(), 2);
        Ok(())
    }

    #[test]
    fn test_issue_create_and_update() -> Result<()> {
        let db = open_db()?;
        let issue = db.create_issue(&NewIssue {
            github_number: 7,
            title: "Fix login".to_string(),
            body: Some("details".to_string()),
            state: IssueState::Open,
            priority: Priority::High,
            board_column: "todo".to_string(),
            board_position: 2,
            remote_url: Some("https://github.com/o/r/issues/7".to_string()),
            author_id: None,
        })?;
        assert_eq!(issue.github_number, 7);
        assert_eq!(issue.board_position, 2);

        let updated = db.update_issue(
            issue.id,
            &IssueChanges {
                priority: Some(Priority::Critical),
                board_column: Some("in-progress".to_string()),
                due_date: Some(Some("2026-09-15T00:00:00Z".to_string())),
                estimated_hours: Some(Some(4.5)),
                ..IssueChanges::default()
            },
        )?;
        assert_eq!(updated.priority, Priority::Critical);
        assert_eq!(updated.board_column, "in-progress");
        assert_eq!(updated.due_date.as_deref(), Some("2026-09-15T00:00:00Z"));
        assert_eq!(updated.estimated_hours, Some(4.5));
        assert_eq!(updated.title, "Fix login");

        let cleared = db.update_issue(
            issue.id,
            &IssueChanges {
                due_date: Some(None),
                ..IssueChanges::default()
            },
        )?;
        assert_eq!(cleared.due_date, None);
        assert_eq!(cleared.estimated_hours, Some(4.5));
        Ok(())
    }

    #[test]
    fn test_upsert_remote_issue_creates_with_board_defaults() -> Result<()> {
        let db = open_db()?;
        let open = db.upsert_remote_issue(1, "Open one", None, IssueState::Open, "https://x/1")?;
        assert_eq!(open.board_column, DEFAULT_BOARD_COLUMN);
        assert_eq!(open.priority, Priority::Medium);

        let closed =
            db.upsert_remote_issue(2, "Closed one", None, IssueState::Closed, "https://x/2")?;
        assert_eq!(closed.board_column, DONE_BOARD_COLUMN);
        Ok(())
    }

    #[test]
    fn test_upsert_remote_issue_preserves_local_fields() -> Result<()> {
        let db = open_db()?;
        let issue = db.upsert_remote_issue(3, "Original", None, IssueState::Open, "https://x/3")?;
        db.update_issue(
            issue.id,
            &IssueChanges {
                priority: Some(Priority::Low),
                board_column: Some("review".to_string()),
                board_position: Some(9),
                ..IssueChanges::default()
            },
        )?;

        let resynced = db.upsert_remote_issue(
            3,
            "Renamed upstream",
            Some("new body"),
            IssueState::Closed,
            "https://x/3",
        )?;
        assert_eq!(resynced.id, issue.id);
        assert_eq!(resynced.title, "Renamed upstream");
        assert_eq!(resynced.state, IssueState::Closed);
        assert_eq!(resynced.priority, Priority::Low);
        assert_eq!(resynced.board_column, "review");
        assert_eq!(resynced.board_position, 9);
        assert!(resynced.synced_at.is_some());

        assert_eq!(db.list_issues()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_delete_issues_absent_from() -> Result<()> {
        let db = open_db()?;
        db.upsert_remote_issue(1, "one", None, IssueState::Open, "https://x/1")?;
        db.upsert_remote_issue(2, "two", None, IssueState::Open, "https://x/2")?;
        db.upsert_remote_issue(3, "three", None, IssueState::Open, "https://x/3")?;

        let deleted = db.delete_issues_absent_from(&[1, 3])?;
        assert_eq!(deleted, 1);
        assert!(db.find_issue_by_number(2)?.is_none());

        let deleted_all = db.delete_issues_absent_from(&[])?;
        assert_eq!(deleted_all, 2);
        assert!(db.list_issues()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_tag_name_case_sensitive_lookup() -> Result<()> {
        let db = open_db()?;
        db.add_tag("Bug", "#ff0000", None, TagCategory::Github)?;

        assert!(db.find_tag_by_name("Bug")?.is_some());
        assert!(db.find_tag_by_name("bug")?.is_none());
        Ok(())
    }

    #[test]
    fn test_create_or_get_tag_falls_back_on_duplicate() -> Result<()> {
        let db = open_db()?;
        let first = db.create_or_get_tag("bug", "#ff0000", None, TagCategory::Github)?;
        let second = db.create_or_get_tag("bug", "#00ff00", None, TagCategory::Github)?;
        assert_eq!(first.id, second.id);
        assert_eq!(second.color, "#ff0000");
        assert_eq!(db.list_tags()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_replace_issue_tags_is_full_replacement() -> Result<()> {
        let db = open_db()?;
        let issue = db.upsert_remote_issue(1, "one", None, IssueState::Open, "https://x/1")?;
        let bug = db.add_tag("bug", "#f00", None, TagCategory::Github)?;
        let ui = db.add_tag("ui", "#0f0", None, TagCategory::Custom("design".into()))?;

        db.replace_issue_tags(issue.id, &[bug.id])?;
        assert_eq!(db.tags_for_issue(issue.id)?.len(), 1);

        db.replace_issue_tags(issue.id, &[ui.id, bug.id])?;
        let names: Vec<String> = db
            .tags_for_issue(issue.id)?
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        assert_eq!(names, vec!["bug".to_string(), "ui".to_string()]);

        db.replace_issue_tags(issue.id, &[])?;
        assert!(db.tags_for_issue(issue.id)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_issue_details_expands_relations() -> Result<()> {
        let db = open_db()?;
        let issue = db.upsert_remote_issue(1, "one", None, IssueState::Open, "https://x/1")?;
        let tag = db.add_tag("bug", "#f00", None, TagCategory::Github)?;
        let group = db.add_group("platform", "#00f", None)?;
        let user = db.add_user("a@example.com", "alice", "hash", None, Role::Member)?;

        db.replace_issue_tags(issue.id, &[tag.id])?;
        db.replace_issue_groups(issue.id, &[group.id])?;
        db.replace_issue_assignees(issue.id, &[user.id])?;

        let details = db.issue_details(issue.id)?;
        assert_eq!(details.tags.len(), 1);
        assert_eq!(details.groups.len(), 1);
        assert_eq!(details.assignees.len(), 1);
        assert_eq!(details.assignees[0].username, "alice");
        Ok(())
    }

    #[test]
    fn test_deleting_issue_cascades_associations() -> Result<()> {
        let db = open_db()?;
        let issue = db.upsert_remote_issue(1, "one", None, IssueState::Open, "https://x/1")?;
        let tag = db.add_tag("bug", "#f00", None, TagCategory::Github)?;
        db.replace_issue_tags(issue.id, &[tag.id])?;

        db.delete_issue(issue.id)?;
        assert!(db.tags_for_issue(issue.id)?.is_empty());
        assert!(db.get_tag(tag.id).is_ok());
        Ok(())
    }

    #[test]
    fn test_deleting_tag_cascades_issue_links() -> Result<()> {
        let db = open_db()?;
        let issue = db.upsert_remote_issue(1, "one", None, IssueState::Open, "https://x/1")?;
        let tag = db.add_tag("bug", "#f00", None, TagCategory::Github)?;
        db.replace_issue_tags(issue.id, &[tag.id])?;

        db.delete_tag(tag.id)?;
        assert!(db.tags_for_issue(issue.id)?.is_empty());
        assert!(db.find_tag_by_name("bug")?.is_none());
        assert!(db.find_issue_by_id(issue.id)?.is_some());
        Ok(())
    }

    #[test]
    fn test_notifications_batch_insert_and_read_flag() -> Result<()> {
        let db = open_db()?;
        let alice = db.add_user("a@example.com", "alice", "hash", None, Role::Member)?;
        let bob = db.add_user("b@example.com", "bob", "hash", None, Role::Member)?;

        let inserted = db.insert_notifications(&[
            NewNotification {
                user_id: alice.id,
                kind: NotificationKind::IssueCreated,
                title: "New issue".to_string(),
                message: Some("Issue #1 was created".to_string()),
                issue_id: None,
            },
            NewNotification {
                user_id: bob.id,
                kind: NotificationKind::IssueCreated,
                title: "New issue".to_string(),
                message: None,
                issue_id: None,
            },
        ])?;
        assert_eq!(inserted, 2);

        let for_alice = db.list_notifications(alice.id)?;
        assert_eq!(for_alice.len(), 1);
        assert!(!for_alice[0].read);

        db.mark_notification_read(for_alice[0].id)?;
        assert!(db.list_notifications(alice.id)?[0].read);
        Ok(())
    }

    #[test]
    fn test_group_membership() -> Result<()> {
        let db = open_db()?;
        let group = db.add_group("platform", "#00f", Some("infra folks".into()))?;
        let user = db.add_user("a@example.com", "alice", "hash", None, Role::Member)?;

        db.add_group_member(group.id, user.id)?;
        db.add_group_member(group.id, user.id)?;
        assert_eq!(db.group_member_ids(group.id)?, vec![user.id]);
        Ok(())
    }
}
