//! Notification fan-out.
//!
//! Fan-out never addresses the acting user, and the `try_` wrappers log
//! and swallow failures so a broken notification write cannot fail the
//! issue operation that triggered it.

use anyhow::Result;
use tracing::warn;
use uuid::Uuid;

use crate::db::{Database, NewNotification};
use crate::types::NotificationKind;

pub fn notify_all_users(
    db: &Database,
    actor: Option<Uuid>,
    kind: NotificationKind,
    title: &str,
    message: Option<&str>,
    issue_id: Option<Uuid>,
) -> Result<usize> {
    let recipients = db.user_ids_excluding(actor)?;
    insert_for(db, &recipients, kind, title, message, issue_id)
}

pub fn notify_issue_assignees(
    db: &Database,
    issue_id: Uuid,
    actor: Option<Uuid>,
    kind: NotificationKind,
    title: &str,
    message: Option<&str>,
) -> Result<usize> {
    let recipients: Vec<Uuid> = db
        .assignee_ids_for_issue(issue_id)?
        .into_iter()
        .filter(|id| Some(*id) != actor)
        .collect();
    insert_for(db, &recipients, kind, title, message, Some(issue_id))
}

pub fn try_notify_all_users(
    db: &Database,
    actor: Option<Uuid>,
    kind: NotificationKind,
    title: &str,
    message: Option<&str>,
    issue_id: Option<Uuid>,
) -> usize {
    notify_all_users(db, actor, kind, title, message, issue_id).unwrap_or_else(|err| {
        warn!(error = %err, "notification fan-out failed");
        0
    })
}

pub fn try_notify_issue_assignees(
    db: &Database,
    issue_id: Uuid,
    actor: Option<Uuid>,
    kind: NotificationKind,
    title: &str,
    message: Option<&str>,
) -> usize {
    notify_issue_assignees(db, issue_id, actor, kind, title, message).unwrap_or_else(|err| {
        warn!(error = %err, "assignee notification failed");
        0
    })
}

/// Direct fan-out to an explicit recipient list.
pub fn notify_users(
    db: &Database,
    recipients: &[Uuid],
    kind: NotificationKind,
    title: &str,
    message: Option<&str>,
    issue_id: Option<Uuid>,
) -> Result<usize> {
    insert_for(db, recipients, kind, title, message, issue_id)
}

fn insert_for(
    db: &Database,
    recipients: &[Uuid],
    kind: NotificationKind,
    title: &str,
    message: Option<&str>,
    issue_id: Option<Uuid>,
) -> Result<usize> {
    if recipients.is_empty() {
        return Ok(0);
    }
    let rows: Vec<NewNotification> = recipients
        .iter()
        .map(|user_id| NewNotification {
            user_id: *user_id,
            kind,
            title: title.to_string(),
            message: message.map(str::to_string),
            issue_id,
        })
        .collect();
    db.insert_notifications(&rows)
}

#[cfg(test)]
mod tests {
    use crate::types::Role;

    use super::*;

    #[test]
    fn test_notify_all_excludes_actor() -> Result<()> {
        let db = Database::open(":memory:")?;
        let alice = db.add_user("a@example.com", "alice", "hash", None, Role::Member)?;
        let bob = db.add_user("b@example.com", "bob", "hash", None, Role::Member)?;

        let sent = notify_all_users(
            &db,
            Some(alice.id),
            NotificationKind::IssueCreated,
            "New issue",
            Some("Issue #1: Fix login"),
            None,
        )?;
        assert_eq!(sent, 1);
        assert!(db.list_notifications(alice.id)?.is_empty());

        let for_bob = db.list_notifications(bob.id)?;
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].kind, NotificationKind::IssueCreated);
        Ok(())
    }

    #[test]
    fn test_notify_assignees_only_hits_assignees() -> Result<()> {
        let db = Database::open(":memory:")?;
        let alice = db.add_user("a@example.com", "alice", "hash", None, Role::Member)?;
        let bob = db.add_user("b@example.com", "bob", "hash", None, Role::Member)?;
        let carol = db.add_user("c@example.com", "carol", "hash", None, Role::Member)?;

        let issue = db.upsert_remote_issue(
            1,
            "One",
            None,
            crate::types::IssueState::Open,
            "https://x/1",
        )?;
        db.replace_issue_assignees(issue.id, &[alice.id, bob.id])?;

        let sent = notify_issue_assignees(
            &db,
            issue.id,
            Some(alice.id),
            NotificationKind::IssueMoved,
            "Issue moved",
            None,
        )?;
        assert_eq!(sent, 1);
        assert!(db.list_notifications(carol.id)?.is_empty());
        assert_eq!(db.list_notifications(bob.id)?.len(), 1);
        assert_eq!(db.list_notifications(bob.id)?[0].issue_id, Some(issue.id));
        Ok(())
    }

    #[test]
    fn test_no_recipients_inserts_nothing() -> Result<()> {
        let db = Database::open(":memory:")?;
        let only = db.add_user("a@example.com", "alice", "hash", None, Role::Member)?;
        let sent = notify_all_users(
            &db,
            Some(only.id),
            NotificationKind::IssueCreated,
            "New issue",
            None,
            None,
        )?;
        assert_eq!(sent, 0);
        Ok(())
    }
}
