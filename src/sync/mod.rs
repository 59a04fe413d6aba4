//! Remote-to-local issue sync and bidirectional label sync.
//!
//! Issue sync treats GitHub as the source of truth for issue existence,
//! title, body and state: rows are upserted by issue number and local rows
//! whose number no longer appears remotely are deleted. Board placement,
//! priority and the rest of the local-only columns survive re-syncs, so
//! running sync twice in a row is a no-op for the second run.

use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::github::{RemoteLabel, RemoteStateFilter, RemoteTracker};
use crate::types::{IssueState, TagCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Import,
    Export,
    Both,
}

impl SyncDirection {
    fn imports(self) -> bool {
        matches!(self, SyncDirection::Import | SyncDirection::Both)
    }

    fn exports(self) -> bool {
        matches!(self, SyncDirection::Export | SyncDirection::Both)
    }
}

impl FromStr for SyncDirection {
    type Err = ();

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "import" => Ok(SyncDirection::Import),
            "export" => Ok(SyncDirection::Export),
            "both" => Ok(SyncDirection::Both),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueSyncReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TagSyncReport {
    pub imported: usize,
    pub exported: usize,
    pub errors: Vec<String>,
}

fn tag_color_for(label: &RemoteLabel) -> String {
    if label.color.starts_with('#') {
        label.color.clone()
    } else {
        format!("#{}", label.color)
    }
}

/// Pull the full remote issue list and reconcile the local cache with it.
///
/// For each remote issue the matching labels become tag links: a label
/// whose exact name already exists as a tag reuses it, otherwise a new
/// github-category tag is created. The issue's tag set is then replaced
/// wholesale, so labels removed upstream disappear locally too.
pub fn sync_issues(db: &Database, remote: &dyn RemoteTracker) -> Result<IssueSyncReport> {
    let remote_issues = remote.list_issues(RemoteStateFilter::All)?;

    let mut report = IssueSyncReport {
        fetched: remote_issues.len(),
        ..IssueSyncReport::default()
    };

    let present: Vec<i64> = remote_issues.iter().map(|issue| issue.number).collect();
    report.deleted = db.delete_issues_absent_from(&present)?;

    for remote_issue in &remote_issues {
        let existed = db.find_issue_by_number(remote_issue.number)?.is_some();
        let issue = db.upsert_remote_issue(
            remote_issue.number,
            &remote_issue.title,
            remote_issue.body.as_deref(),
            IssueState::from_remote(&remote_issue.state),
            &remote_issue.html_url,
        )?;
        if existed {
            report.updated += 1;
        } else {
            report.created += 1;
        }

        let mut tag_ids = Vec::with_capacity(remote_issue.labels.len());
        for label in &remote_issue.labels {
            let tag = match db.find_tag_by_name(&label.name)? {
                Some(tag) => tag,
                None => db.create_or_get_tag(
                    &label.name,
                    &tag_color_for(label),
                    label.description.clone(),
                    TagCategory::Github,
                )?,
            };
            tag_ids.push(tag.id);
        }
        db.replace_issue_tags(issue.id, &tag_ids)?;
    }

    info!(
        fetched = report.fetched,
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        "issue sync finished"
    );
    Ok(report)
}

/// Reconcile tags and labels in the requested direction(s).
///
/// Matching is case-insensitive in both directions so `Bug` and `bug` are
/// treated as the same entry. Failures on individual items are collected
/// into the report instead of aborting the run.
pub fn sync_tags(
    db: &Database,
    remote: &dyn RemoteTracker,
    direction: SyncDirection,
) -> Result<TagSyncReport> {
    let labels = remote.list_labels()?;
    let tags = db.list_tags()?;
    let mut report = TagSyncReport::default();

    if direction.imports() {
        for label in &labels {
            let known = tags
                .iter()
                .any(|tag| tag.name.eq_ignore_ascii_case(&label.name));
            if known {
                continue;
            }
            match db.create_or_get_tag(
                &label.name,
                &tag_color_for(label),
                label.description.clone(),
                TagCategory::Github,
            ) {
                Ok(_) => report.imported += 1,
                Err(err) => {
                    warn!(label = %label.name, error = %err, "label import failed");
                    report.errors.push(format!("import {}: {err}", label.name));
                }
            }
        }
    }

    if direction.exports() {
        for tag in &tags {
            let known = labels
                .iter()
                .any(|label| label.name.eq_ignore_ascii_case(&tag.name));
            if known {
                continue;
            }
            match remote.create_label(&tag.name, &tag.color, tag.description.as_deref()) {
                Ok(_) => report.exported += 1,
                Err(err) => {
                    warn!(tag = %tag.name, error = %err, "label export failed");
                    report.errors.push(format!("export {}: {err}", tag.name));
                }
            }
        }
    }

    info!(
        imported = report.imported,
        exported = report.exported,
        errors = report.errors.len(),
        "tag sync finished"
    );
    Ok(report)
}
