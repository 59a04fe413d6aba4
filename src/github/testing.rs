//! In-memory `RemoteTracker` double for unit and integration tests.

use std::cell::{Cell, RefCell};

use crate::error::{Error, Result};

use super::{
    RemoteComment, RemoteIssue, RemoteIssueChanges, RemoteLabel, RemoteRepo, RemoteStateFilter,
    RemoteTracker,
};

pub struct FakeTracker {
    pub issues: RefCell<Vec<RemoteIssue>>,
    pub labels: RefCell<Vec<RemoteLabel>>,
    pub comments: RefCell<Vec<(i64, RemoteComment)>>,
    pub next_number: Cell<i64>,
    pub created_labels: RefCell<Vec<String>>,
    pub uploads: RefCell<Vec<String>>,
    pub updates: RefCell<Vec<(i64, RemoteIssueChanges)>>,
    pub fail_issue_updates: Cell<bool>,
    pub fail_label_creation: Cell<bool>,
    pub fail_uploads: Cell<bool>,
}

impl Default for FakeTracker {
    fn default() -> Self {
        Self {
            issues: RefCell::new(Vec::new()),
            labels: RefCell::new(Vec::new()),
            comments: RefCell::new(Vec::new()),
            next_number: Cell::new(1),
            created_labels: RefCell::new(Vec::new()),
            uploads: RefCell::new(Vec::new()),
            updates: RefCell::new(Vec::new()),
            fail_issue_updates: Cell::new(false),
            fail_label_creation: Cell::new(false),
            fail_uploads: Cell::new(false),
        }
    }
}

impl FakeTracker {
    pub fn issue(number: i64, title: &str, body: Option<&str>, state: &str) -> RemoteIssue {
        RemoteIssue {
            number,
            title: title.to_string(),
            body: body.map(str::to_string),
            state: state.to_string(),
            html_url: format!("https://github.com/octocat/hello-world/issues/{number}"),
            labels: Vec::new(),
            pull_request: None,
        }
    }

    pub fn label(name: &str, color: &str) -> RemoteLabel {
        RemoteLabel {
            name: name.to_string(),
            color: color.to_string(),
            description: None,
        }
    }

    pub fn push_issue(&self, issue: RemoteIssue) {
        if issue.number >= self.next_number.get() {
            self.next_number.set(issue.number + 1);
        }
        self.issues.borrow_mut().push(issue);
    }
}

impl RemoteTracker for FakeTracker {
    fn list_issues(&self, filter: RemoteStateFilter) -> Result<Vec<RemoteIssue>> {
        Ok(self
            .issues
            .borrow()
            .iter()
            .filter(|issue| issue.pull_request.is_none())
            .filter(|issue| match filter {
                RemoteStateFilter::All => true,
                RemoteStateFilter::Open => issue.state == "open",
                RemoteStateFilter::Closed => issue.state == "closed",
            })
            .cloned()
            .collect())
    }

    fn create_issue(
        &self,
        title: &str,
        body: Option<&str>,
        labels: &[String],
    ) -> Result<RemoteIssue> {
        let number = self.next_number.get();
        self.next_number.set(number + 1);
        let mut issue = Self::issue(number, title, body, "open");
        issue.labels = labels
            .iter()
            .map(|name| Self::label(name, "ededed"))
            .collect();
        self.issues.borrow_mut().push(issue.clone());
        Ok(issue)
    }

    fn update_issue(&self, number: i64, changes: &RemoteIssueChanges) -> Result<RemoteIssue> {
        if self.fail_issue_updates.get() {
            return Err(Error::RemoteUnavailable("issue API is down".to_string()));
        }
        let mut issues = self.issues.borrow_mut();
        let issue = issues
            .iter_mut()
            .find(|issue| issue.number == number)
            .ok_or_else(|| Error::NotFound(format!("issue {number}")))?;

        if let Some(title) = &changes.title {
            issue.title = title.clone();
        }
        if let Some(body) = &changes.body {
            issue.body = Some(body.clone());
        }
        if let Some(state) = changes.state {
            issue.state = state.to_string();
        }
        if let Some(labels) = &changes.labels {
            issue.labels = labels
                .iter()
                .map(|name| Self::label(name, "ededed"))
                .collect();
        }
        self.updates.borrow_mut().push((number, changes.clone()));
        Ok(issue.clone())
    }

    fn list_comments(&self, number: i64) -> Result<Vec<RemoteComment>> {
        Ok(self
            .comments
            .borrow()
            .iter()
            .filter(|(for_number, _)| *for_number == number)
            .map(|(_, comment)| comment.clone())
            .collect())
    }

    fn add_comment(&self, number: i64, body: &str) -> Result<RemoteComment> {
        let comment = RemoteComment {
            id: self.comments.borrow().len() as i64 + 1,
            body: Some(body.to_string()),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            user: None,
        };
        self.comments.borrow_mut().push((number, comment.clone()));
        Ok(comment)
    }

    fn list_labels(&self) -> Result<Vec<RemoteLabel>> {
        Ok(self.labels.borrow().clone())
    }

    fn create_label(
        &self,
        name: &str,
        color: &str,
        description: Option<&str>,
    ) -> Result<RemoteLabel> {
        if self.fail_label_creation.get() {
            return Err(Error::RemoteUnavailable("label API is down".to_string()));
        }
        let label = RemoteLabel {
            name: name.to_string(),
            color: super::normalize_color(color),
            description: description.map(str::to_string),
        };
        self.created_labels.borrow_mut().push(name.to_string());
        self.labels.borrow_mut().push(label.clone());
        Ok(label)
    }

    fn delete_label(&self, name: &str) -> Result<()> {
        self.labels.borrow_mut().retain(|label| label.name != name);
        Ok(())
    }

    fn upload_file(&self, filename: &str, _content: &[u8]) -> Result<String> {
        if self.fail_uploads.get() {
            return Err(Error::Upload(format!("no download URL returned for {filename}")));
        }
        self.uploads.borrow_mut().push(filename.to_string());
        Ok(format!(
            "https://raw.githubusercontent.com/octocat/hello-world/main/.github/images/{filename}"
        ))
    }

    fn validate_connection(&self) -> Result<RemoteRepo> {
        Ok(RemoteRepo {
            full_name: "octocat/hello-world".to_string(),
            default_branch: "main".to_string(),
            open_issues_count: self.issues.borrow().len() as i64,
        })
    }
}
