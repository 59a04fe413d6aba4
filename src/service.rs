//! Issue operations that span the cache, the remote tracker and the
//! notification fan-out.
//!
//! GitHub owns title, body and state; the cache owns board placement,
//! priority, due dates, estimates and associations. Every operation that
//! touches a remote-owned field writes GitHub first and only persists
//! locally once the remote write succeeded.

use tracing::{info, warn};
use uuid::Uuid;

use crate::board::{IssueFeed, MovePersister};
use crate::db::{Database, IssueChanges, NewIssue};
use crate::error::{Error, Result};
use crate::github::{RemoteComment, RemoteIssueChanges, RemoteTracker};
use crate::images::{expand_image_urls, hide_image_urls};
use crate::notify;
use crate::sync::{self, IssueSyncReport, SyncDirection, TagSyncReport};
use crate::types::{
    IssueDetails, IssueState, NotificationKind, Priority, RepoConfig, Role, TagCategory, User,
};

#[derive(Debug, Clone, Default)]
pub struct CreateIssue {
    pub title: String,
    pub body: Option<String>,
    pub priority: Option<Priority>,
    pub tag_ids: Vec<Uuid>,
    pub group_ids: Vec<Uuid>,
    pub assignee_ids: Vec<Uuid>,
    pub due_date: Option<String>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateIssue {
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<IssueState>,
    pub priority: Option<Priority>,
    pub board_column: Option<String>,
    pub board_position: Option<i64>,
    pub due_date: Option<Option<String>>,
    pub estimated_hours: Option<Option<f64>>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub group_ids: Option<Vec<Uuid>>,
    pub assignee_ids: Option<Vec<Uuid>>,
}

impl UpdateIssue {
    fn touches_remote(&self) -> bool {
        self.title.is_some() || self.body.is_some() || self.state.is_some()
    }
}

pub struct IssueService<'a> {
    db: &'a Database,
    remote: &'a dyn RemoteTracker,
    config: RepoConfig,
}

impl<'a> IssueService<'a> {
    pub fn new(db: &'a Database, remote: &'a dyn RemoteTracker, config: RepoConfig) -> Self {
        Self { db, remote, config }
    }

    fn require_configured(&self) -> Result<()> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(Error::RemoteUnavailable(
                "no GitHub repository configured".to_string(),
            ))
        }
    }

    /// The expanded issue list, optionally refreshed from the remote
    /// first. With no repository configured the cache is served as-is.
    pub fn list(&self, refresh: bool) -> Result<Vec<IssueDetails>> {
        if refresh && self.config.is_configured() {
            sync::sync_issues(self.db, self.remote)?;
        }
        Ok(self.db.list_issue_details()?)
    }

    pub fn get(&self, id: Uuid) -> Result<IssueDetails> {
        match self.db.find_issue_by_id(id)? {
            Some(issue) => Ok(self.db.issue_details(issue.id)?),
            None => Err(Error::NotFound(format!("issue {id}"))),
        }
    }

    pub fn sync_issues(&self) -> Result<IssueSyncReport> {
        self.require_configured()?;
        sync::sync_issues(self.db, self.remote)
    }

    /// Tag/label sync is restricted to admins.
    pub fn sync_tags(&self, actor: Option<&User>, direction: SyncDirection) -> Result<TagSyncReport> {
        let actor = actor.ok_or(Error::Unauthorized)?;
        if actor.role != Role::Admin {
            return Err(Error::Forbidden("admin access required".to_string()));
        }
        self.require_configured()?;
        sync::sync_tags(self.db, self.remote, direction)
    }

    /// Create the issue on GitHub first, then cache it locally with its
    /// associations. Everyone except the author is notified; assignees
    /// get an additional assignment notification.
    pub fn create(&self, actor: Option<&User>, input: &CreateIssue) -> Result<IssueDetails> {
        let actor = actor.ok_or(Error::Unauthorized)?;
        if input.title.trim().is_empty() {
            return Err(Error::Validation("title is required".to_string()));
        }
        self.require_configured()?;

        let labels: Vec<String> = input
            .tag_ids
            .iter()
            .map(|id| Ok(self.db.get_tag(*id)?.name))
            .collect::<Result<_>>()?;

        let remote_body = input
            .body
            .as_deref()
            .map(|body| expand_image_urls(body, &self.config));
        let remote_issue =
            self.remote
                .create_issue(&input.title, remote_body.as_deref(), &labels)?;

        let issue = self.db.create_issue(&NewIssue {
            github_number: remote_issue.number,
            title: input.title.clone(),
            body: input.body.clone(),
            state: IssueState::Open,
            priority: input.priority.unwrap_or(Priority::Medium),
            board_column: crate::db::DEFAULT_BOARD_COLUMN.to_string(),
            board_position: 0,
            remote_url: Some(remote_issue.html_url.clone()),
            author_id: Some(actor.id),
        })?;

        if input.due_date.is_some() || input.estimated_hours.is_some() {
            self.db.update_issue(
                issue.id,
                &IssueChanges {
                    due_date: input.due_date.clone().map(Some),
                    estimated_hours: input.estimated_hours.map(Some),
                    ..IssueChanges::default()
                },
            )?;
        }

        self.db.replace_issue_tags(issue.id, &input.tag_ids)?;
        self.db.replace_issue_groups(issue.id, &input.group_ids)?;
        self.db
            .replace_issue_assignees(issue.id, &input.assignee_ids)?;

        notify::try_notify_all_users(
            self.db,
            Some(actor.id),
            NotificationKind::IssueCreated,
            "New issue",
            Some(&format!("#{}: {}", remote_issue.number, input.title)),
            Some(issue.id),
        );
        if !input.assignee_ids.is_empty() {
            notify::try_notify_issue_assignees(
                self.db,
                issue.id,
                Some(actor.id),
                NotificationKind::IssueAssigned,
                "You were assigned an issue",
                Some(&input.title),
            );
        }

        info!(number = remote_issue.number, "issue created");
        Ok(self.db.issue_details(issue.id)?)
    }

    /// Apply a partial update. Remote-owned fields are mirrored to GitHub
    /// before the cache changes; board placement and the other local-only
    /// fields never leave the machine.
    pub fn update(&self, actor: Option<&User>, id: Uuid, changes: &UpdateIssue) -> Result<IssueDetails> {
        let Some(current) = self.db.find_issue_by_id(id)? else {
            return Err(Error::NotFound(format!("issue {id}")));
        };

        if changes.touches_remote() {
            self.require_configured()?;
            let remote_changes = RemoteIssueChanges {
                title: changes.title.clone(),
                body: changes
                    .body
                    .as_deref()
                    .map(|body| expand_image_urls(body, &self.config)),
                state: changes.state.map(IssueState::to_remote),
                labels: None,
            };
            self.remote
                .update_issue(current.github_number, &remote_changes)?;
        }

        let updated = self.db.update_issue(
            id,
            &IssueChanges {
                title: changes.title.clone(),
                body: changes.body.clone(),
                state: changes.state,
                priority: changes.priority,
                board_column: changes.board_column.clone(),
                board_position: changes.board_position,
                due_date: changes.due_date.clone(),
                estimated_hours: changes.estimated_hours,
            },
        )?;

        let previous_assignees = self.db.assignee_ids_for_issue(id)?;
        if let Some(tag_ids) = &changes.tag_ids {
            self.db.replace_issue_tags(id, tag_ids)?;
        }
        if let Some(group_ids) = &changes.group_ids {
            self.db.replace_issue_groups(id, group_ids)?;
        }
        if let Some(assignee_ids) = &changes.assignee_ids {
            self.db.replace_issue_assignees(id, assignee_ids)?;

            let added: Vec<Uuid> = assignee_ids
                .iter()
                .copied()
                .filter(|user_id| !previous_assignees.contains(user_id))
                .filter(|user_id| Some(*user_id) != actor.map(|user| user.id))
                .collect();
            if !added.is_empty()
                && let Err(err) = notify::notify_users(
                    self.db,
                    &added,
                    NotificationKind::IssueAssigned,
                    "You were assigned an issue",
                    Some(&updated.title),
                    Some(id),
                )
            {
                warn!(error = %err, "assignment notification failed");
            }
        }

        if let Some(column) = &changes.board_column
            && *column != current.board_column
        {
            notify::try_notify_issue_assignees(
                self.db,
                id,
                actor.map(|user| user.id),
                NotificationKind::IssueMoved,
                "Issue moved",
                Some(&format!(
                    "{} moved to {column}",
                    updated.title
                )),
            );
        }

        Ok(self.db.issue_details(id)?)
    }

    /// Deleting locally closes the GitHub issue first; the remote issue
    /// itself is never deleted, GitHub does not support that.
    pub fn delete(&self, _actor: Option<&User>, id: Uuid) -> Result<()> {
        let Some(issue) = self.db.find_issue_by_id(id)? else {
            return Err(Error::NotFound(format!("issue {id}")));
        };

        if self.config.is_configured() {
            self.remote.close_issue(issue.github_number)?;
        }
        self.db.delete_issue(id)?;
        info!(number = issue.github_number, "issue deleted locally");
        Ok(())
    }

    /// Comments live only on GitHub; there is no local cache for them.
    /// Bodies come back with image URLs shortened for display.
    pub fn comments(&self, id: Uuid) -> Result<Vec<RemoteComment>> {
        let Some(issue) = self.db.find_issue_by_id(id)? else {
            return Err(Error::NotFound(format!("issue {id}")));
        };
        self.require_configured()?;

        let mut comments = self.remote.list_comments(issue.github_number)?;
        for comment in &mut comments {
            if let Some(body) = comment.body.take() {
                comment.body = Some(hide_image_urls(&body, &self.config));
            }
        }
        Ok(comments)
    }

    pub fn add_comment(&self, actor: Option<&User>, id: Uuid, body: &str) -> Result<RemoteComment> {
        actor.ok_or(Error::Unauthorized)?;
        if body.trim().is_empty() {
            return Err(Error::Validation("comment body is required".to_string()));
        }
        let Some(issue) = self.db.find_issue_by_id(id)? else {
            return Err(Error::NotFound(format!("issue {id}")));
        };
        self.require_configured()?;

        self.remote
            .add_comment(issue.github_number, &expand_image_urls(body, &self.config))
    }

    /// Removing a tag that was imported from a label also removes the
    /// label; admin only, same as label sync. A label that is already
    /// gone remotely does not block the local delete.
    pub fn delete_tag(&self, actor: Option<&User>, name: &str) -> Result<()> {
        let actor = actor.ok_or(Error::Unauthorized)?;
        if actor.role != Role::Admin {
            return Err(Error::Forbidden("admin access required".to_string()));
        }
        let Some(tag) = self.db.find_tag_by_name(name)? else {
            return Err(Error::NotFound(format!("tag '{name}'")));
        };

        if tag.category == TagCategory::Github && self.config.is_configured() {
            match self.remote.delete_label(&tag.name) {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        self.db.delete_tag(tag.id)?;
        info!(tag = %tag.name, "tag deleted");
        Ok(())
    }

    /// Push an image into the repository and hand back the short `/img/`
    /// path that issue bodies use.
    pub fn upload_image(&self, filename: &str, content: &[u8]) -> Result<String> {
        self.require_configured()?;
        let url = self.remote.upload_file(filename, content)?;
        Ok(hide_image_urls(&url, &self.config))
    }
}

impl IssueFeed for IssueService<'_> {
    fn fetch_board(&self, sync: bool) -> Result<Vec<IssueDetails>> {
        self.list(sync)
    }
}

impl MovePersister for IssueService<'_> {
    fn persist_move(
        &self,
        issue_id: Uuid,
        column: &str,
        position: i64,
        state: IssueState,
    ) -> Result<()> {
        self.update(
            None,
            issue_id,
            &UpdateIssue {
                state: Some(state),
                board_column: Some(column.to_string()),
                board_position: Some(position),
                ..UpdateIssue::default()
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::github::testing::FakeTracker;
    use crate::types::Role;

    use super::*;

    fn setup() -> (Database, FakeTracker, RepoConfig) {
        let db = Database::open(":memory:").unwrap();
        let tracker = FakeTracker::default();
        let config = RepoConfig::new("octocat", "hello-world");
        (db, tracker, config)
    }

    fn admin(db: &Database) -> User {
        db.add_user("admin@example.com", "admin", "hash", None, Role::Admin)
            .unwrap()
    }

    fn member(db: &Database) -> User {
        db.add_user("member@example.com", "member", "hash", None, Role::Member)
            .unwrap()
    }

    #[test]
    fn test_create_requires_actor_and_title() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);

        let input = CreateIssue {
            title: "Fix login".to_string(),
            ..CreateIssue::default()
        };
        assert!(matches!(
            service.create(None, &input),
            Err(Error::Unauthorized)
        ));

        let blank = CreateIssue {
            title: "   ".to_string(),
            ..CreateIssue::default()
        };
        assert!(matches!(
            service.create(Some(&user), &blank),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_create_requires_configured_repo() {
        let (db, tracker, _) = setup();
        let service = IssueService::new(&db, &tracker, RepoConfig::default());
        let user = member(&db);

        let input = CreateIssue {
            title: "Fix login".to_string(),
            ..CreateIssue::default()
        };
        assert!(matches!(
            service.create(Some(&user), &input),
            Err(Error::RemoteUnavailable(_))
        ));
        assert!(tracker.issues.borrow().is_empty());
    }

    #[test]
    fn test_create_writes_remote_then_cache_and_notifies() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let author = member(&db);
        let other = db
            .add_user("other@example.com", "other", "hash", None, Role::Member)
            .unwrap();
        let tag = db
            .add_tag("bug", "#ff0000", None, crate::types::TagCategory::Github)
            .unwrap();

        let details = service
            .create(
                Some(&author),
                &CreateIssue {
                    title: "Fix login".to_string(),
                    body: Some("see ![trace](/img/trace.png)".to_string()),
                    priority: Some(Priority::High),
                    tag_ids: vec![tag.id],
                    assignee_ids: vec![other.id],
                    ..CreateIssue::default()
                },
            )
            .unwrap();

        assert_eq!(details.issue.github_number, 1);
        assert_eq!(details.issue.priority, Priority::High);
        assert_eq!(details.issue.board_column, "backlog");
        assert_eq!(details.issue.author_id, Some(author.id));
        assert_eq!(details.tags[0].name, "bug");
        assert_eq!(details.assignees[0].id, other.id);
        // The cached body keeps the short image path.
        assert_eq!(
            details.issue.body.as_deref(),
            Some("see ![trace](/img/trace.png)")
        );

        // The remote body got the expanded URL.
        let remote = tracker.issues.borrow();
        assert!(
            remote[0]
                .body
                .as_deref()
                .unwrap()
                .contains("raw.githubusercontent.com/octocat/hello-world")
        );

        // Created + assigned notifications, none for the author.
        assert!(db.list_notifications(author.id).unwrap().is_empty());
        assert_eq!(db.list_notifications(other.id).unwrap().len(), 2);
    }

    #[test]
    fn test_update_mirrors_remote_fields() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Original".to_string(),
                    ..CreateIssue::default()
                },
            )
            .unwrap();

        service
            .update(
                Some(&user),
                details.issue.id,
                &UpdateIssue {
                    title: Some("Renamed".to_string()),
                    state: Some(IssueState::Closed),
                    ..UpdateIssue::default()
                },
            )
            .unwrap();

        let remote = tracker.issues.borrow();
        assert_eq!(remote[0].title, "Renamed");
        assert_eq!(remote[0].state, "closed");
    }

    #[test]
    fn test_update_board_fields_never_touch_remote() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Card".to_string(),
                    ..CreateIssue::default()
                },
            )
            .unwrap();
        assert!(tracker.updates.borrow().is_empty());

        let updated = service
            .update(
                Some(&user),
                details.issue.id,
                &UpdateIssue {
                    priority: Some(Priority::Critical),
                    board_column: Some("review".to_string()),
                    board_position: Some(4),
                    ..UpdateIssue::default()
                },
            )
            .unwrap();

        assert_eq!(updated.issue.board_column, "review");
        assert!(tracker.updates.borrow().is_empty());
    }

    #[test]
    fn test_update_failure_leaves_cache_untouched() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Original".to_string(),
                    ..CreateIssue::default()
                },
            )
            .unwrap();

        tracker.fail_issue_updates.set(true);
        let result = service.update(
            Some(&user),
            details.issue.id,
            &UpdateIssue {
                title: Some("Renamed".to_string()),
                ..UpdateIssue::default()
            },
        );
        assert!(matches!(result, Err(Error::RemoteUnavailable(_))));
        assert_eq!(db.get_issue(details.issue.id).unwrap().title, "Original");
    }

    #[test]
    fn test_update_notifies_new_assignees_only() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);
        let old = db
            .add_user("old@example.com", "old", "hash", None, Role::Member)
            .unwrap();
        let new = db
            .add_user("new@example.com", "new", "hash", None, Role::Member)
            .unwrap();

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Card".to_string(),
                    assignee_ids: vec![old.id],
                    ..CreateIssue::default()
                },
            )
            .unwrap();
        let before_old = db.list_notifications(old.id).unwrap().len();

        service
            .update(
                Some(&user),
                details.issue.id,
                &UpdateIssue {
                    assignee_ids: Some(vec![old.id, new.id]),
                    ..UpdateIssue::default()
                },
            )
            .unwrap();

        assert_eq!(db.list_notifications(old.id).unwrap().len(), before_old);
        let for_new = db.list_notifications(new.id).unwrap();
        assert!(
            for_new
                .iter()
                .any(|n| n.kind == NotificationKind::IssueAssigned)
        );
    }

    #[test]
    fn test_move_notification_goes_to_assignees() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);
        let assignee = db
            .add_user("a@example.com", "assignee", "hash", None, Role::Member)
            .unwrap();

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Card".to_string(),
                    assignee_ids: vec![assignee.id],
                    ..CreateIssue::default()
                },
            )
            .unwrap();

        service
            .update(
                Some(&user),
                details.issue.id,
                &UpdateIssue {
                    board_column: Some("in-progress".to_string()),
                    ..UpdateIssue::default()
                },
            )
            .unwrap();

        let moved: Vec<_> = db
            .list_notifications(assignee.id)
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::IssueMoved)
            .collect();
        assert_eq!(moved.len(), 1);
        assert!(
            moved[0]
                .message
                .as_deref()
                .unwrap()
                .contains("in-progress")
        );
    }

    #[test]
    fn test_delete_closes_remote_then_removes_local() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Doomed".to_string(),
                    ..CreateIssue::default()
                },
            )
            .unwrap();

        service.delete(Some(&user), details.issue.id).unwrap();
        assert!(db.find_issue_by_id(details.issue.id).unwrap().is_none());
        assert_eq!(tracker.issues.borrow()[0].state, "closed");
    }

    #[test]
    fn test_delete_failure_keeps_local_row() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Sticky".to_string(),
                    ..CreateIssue::default()
                },
            )
            .unwrap();

        tracker.fail_issue_updates.set(true);
        assert!(service.delete(Some(&user), details.issue.id).is_err());
        assert!(db.find_issue_by_id(details.issue.id).unwrap().is_some());
    }

    #[test]
    fn test_sync_tags_requires_admin() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);
        let root = admin(&db);

        assert!(matches!(
            service.sync_tags(None, SyncDirection::Both),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            service.sync_tags(Some(&user), SyncDirection::Both),
            Err(Error::Forbidden(_))
        ));
        assert!(service.sync_tags(Some(&root), SyncDirection::Both).is_ok());
    }

    #[test]
    fn test_upload_image_returns_short_path() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);

        let url = service.upload_image("shot.png", b"fake png bytes").unwrap();
        assert_eq!(url, "/img/shot.png");
        assert_eq!(tracker.uploads.borrow().as_slice(), ["shot.png".to_string()]);
    }

    #[test]
    fn test_comments_round_trip_image_urls() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Card".to_string(),
                    ..CreateIssue::default()
                },
            )
            .unwrap();

        service
            .add_comment(Some(&user), details.issue.id, "see ![s](/img/s.png)")
            .unwrap();

        // The remote copy carries the absolute URL.
        let stored = tracker.comments.borrow();
        assert!(
            stored[0]
                .1
                .body
                .as_deref()
                .unwrap()
                .contains("raw.githubusercontent.com/octocat/hello-world")
        );
        drop(stored);

        // Reading it back shortens the URL again.
        let comments = service.comments(details.issue.id).unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.as_deref().unwrap().contains("(/img/s.png)"));
    }

    #[test]
    fn test_add_comment_requires_actor_and_body() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);

        let details = service
            .create(
                Some(&user),
                &CreateIssue {
                    title: "Card".to_string(),
                    ..CreateIssue::default()
                },
            )
            .unwrap();

        assert!(matches!(
            service.add_comment(None, details.issue.id, "hello"),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            service.add_comment(Some(&user), details.issue.id, "   "),
            Err(Error::Validation(_))
        ));
        assert!(tracker.comments.borrow().is_empty());
    }

    #[test]
    fn test_delete_tag_is_admin_gated_and_removes_label() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let user = member(&db);
        let root = admin(&db);

        db.add_tag("bug", "#ff0000", None, crate::types::TagCategory::Github)
            .unwrap();
        tracker
            .labels
            .borrow_mut()
            .push(FakeTracker::label("bug", "ff0000"));

        assert!(matches!(
            service.delete_tag(Some(&user), "bug"),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_tag(Some(&root), "ghost"),
            Err(Error::NotFound(_))
        ));

        service.delete_tag(Some(&root), "bug").unwrap();
        assert!(db.find_tag_by_name("bug").unwrap().is_none());
        assert!(tracker.labels.borrow().is_empty());
    }

    #[test]
    fn test_delete_tag_keeps_custom_labels_remote() {
        let (db, tracker, config) = setup();
        let service = IssueService::new(&db, &tracker, config);
        let root = admin(&db);

        db.add_tag(
            "internal",
            "#123456",
            None,
            crate::types::TagCategory::Custom("local".into()),
        )
        .unwrap();
        tracker
            .labels
            .borrow_mut()
            .push(FakeTracker::label("internal", "123456"));

        service.delete_tag(Some(&root), "internal").unwrap();
        assert!(db.find_tag_by_name("internal").unwrap().is_none());
        // Only github-category tags touch the label API.
        assert_eq!(tracker.labels.borrow().len(), 1);
    }

    #[test]
    fn test_list_without_repo_serves_cache() {
        let (db, tracker, _) = setup();
        db.upsert_remote_issue(9, "cached", None, IssueState::Open, "https://x/9")
            .unwrap();
        let service = IssueService::new(&db, &tracker, RepoConfig::default());

        let issues = service.list(true).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            service.sync_issues(),
            Err(Error::RemoteUnavailable(_))
        ));
    }
}
