//! GitHub REST access behind the `RemoteTracker` seam.
//!
//! Everything the rest of the crate needs from GitHub goes through the
//! trait so sync and service logic can run against a fake in tests. The
//! real client is a blocking reqwest wrapper over the v3 REST API.

use std::time::Duration;

pub mod testing;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::RepoConfig;

const API_ROOT: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const PAGE_SIZE: usize = 100;
const IMAGE_DIR: &str = ".github/images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStateFilter {
    Open,
    Closed,
    All,
}

impl RemoteStateFilter {
    fn as_query_value(self) -> &'static str {
        match self {
            RemoteStateFilter::Open => "open",
            RemoteStateFilter::Closed => "closed",
            RemoteStateFilter::All => "all",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteIssue {
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<RemoteLabel>,
    /// Present when the "issue" is really a pull request; such entries are
    /// filtered out before they reach the cache.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteLabel {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteComment {
    pub id: i64,
    pub body: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub user: Option<RemoteAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAccount {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRepo {
    pub full_name: String,
    pub default_branch: String,
    #[serde(default)]
    pub open_issues_count: i64,
}

/// Partial issue update; absent fields are omitted from the request body
/// so GitHub leaves them unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoteIssueChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl RemoteIssueChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.state.is_none() && self.labels.is_none()
    }
}

pub trait RemoteTracker {
    fn list_issues(&self, filter: RemoteStateFilter) -> Result<Vec<RemoteIssue>>;
    fn create_issue(
        &self,
        title: &str,
        body: Option<&str>,
        labels: &[String],
    ) -> Result<RemoteIssue>;
    fn update_issue(&self, number: i64, changes: &RemoteIssueChanges) -> Result<RemoteIssue>;

    fn close_issue(&self, number: i64) -> Result<RemoteIssue> {
        self.update_issue(
            number,
            &RemoteIssueChanges {
                state: Some("closed"),
                ..RemoteIssueChanges::default()
            },
        )
    }

    fn reopen_issue(&self, number: i64) -> Result<RemoteIssue> {
        self.update_issue(
            number,
            &RemoteIssueChanges {
                state: Some("open"),
                ..RemoteIssueChanges::default()
            },
        )
    }

    fn list_comments(&self, number: i64) -> Result<Vec<RemoteComment>>;
    fn add_comment(&self, number: i64, body: &str) -> Result<RemoteComment>;
    fn list_labels(&self) -> Result<Vec<RemoteLabel>>;
    fn create_label(
        &self,
        name: &str,
        color: &str,
        description: Option<&str>,
    ) -> Result<RemoteLabel>;
    fn delete_label(&self, name: &str) -> Result<()>;
    /// Upload a file into the repository's image directory on the default
    /// branch and return its raw download URL.
    fn upload_file(&self, filename: &str, content: &[u8]) -> Result<String>;
    fn validate_connection(&self) -> Result<RemoteRepo>;
}

pub struct GitHubClient {
    http: reqwest::blocking::Client,
    token: String,
    config: RepoConfig,
}

impl GitHubClient {
    pub fn new(config: RepoConfig, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("issueboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| Error::RemoteUnavailable(format!("failed to build client: {err}")))?;
        Ok(Self {
            http,
            token: token.into(),
            config,
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{API_ROOT}/repos/{}/{}{path}",
            self.config.owner, self.config.repo
        )
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response> {
        let response = request
            .bearer_auth(&self.token)
            .header("Accept", ACCEPT_JSON)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .map_err(|err| Error::RemoteUnavailable(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!(
                "{}/{}",
                self.config.owner, self.config.repo
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "GitHub API returned {status}: {body}"
            )));
        }
        Ok(response)
    }

    fn decode<T: serde::de::DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T> {
        response
            .json::<T>()
            .map_err(|err| Error::RemoteUnavailable(format!("malformed response: {err}")))
    }

    fn collect_pages<T: serde::de::DeserializeOwned>(
        &self,
        make_url: impl Fn(usize) -> String,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let batch: Vec<T> = Self::decode(self.send(self.http.get(make_url(page)))?)?;
            let batch_len = batch.len();
            items.extend(batch);
            if batch_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    /// The account the configured token authenticates as.
    pub fn current_user(&self) -> Result<RemoteAccount> {
        Self::decode(self.send(self.http.get(format!("{API_ROOT}/user")))?)
    }

    pub fn list_orgs(&self) -> Result<Vec<RemoteAccount>> {
        self.collect_pages(|page| format!("{API_ROOT}/user/orgs?per_page={PAGE_SIZE}&page={page}"))
    }

    /// Repositories visible to the token, newest activity first. Scoped to
    /// an organization when `org` is given, otherwise to the user.
    pub fn list_repositories(&self, org: Option<&str>) -> Result<Vec<RemoteRepo>> {
        match org {
            Some(org) => {
                let org = urlencoding::encode(org).into_owned();
                self.collect_pages(|page| {
                    format!(
                        "{API_ROOT}/orgs/{org}/repos?per_page={PAGE_SIZE}&page={page}&sort=updated"
                    )
                })
            }
            None => self.collect_pages(|page| {
                format!("{API_ROOT}/user/repos?per_page={PAGE_SIZE}&page={page}&sort=updated")
            }),
        }
    }

    fn existing_file_sha(&self, path: &str) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct ContentMeta {
            sha: String,
        }

        let url = self.repo_url(&format!("/contents/{path}"));
        match self.send(self.http.get(&url)) {
            Ok(response) => Ok(Some(Self::decode::<ContentMeta>(response)?.sha)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl RemoteTracker for GitHubClient {
    fn list_issues(&self, filter: RemoteStateFilter) -> Result<Vec<RemoteIssue>> {
        let all: Vec<RemoteIssue> = self.collect_pages(|page| {
            self.repo_url(&format!(
                "/issues?state={}&per_page={PAGE_SIZE}&page={page}",
                filter.as_query_value()
            ))
        })?;
        let issues: Vec<RemoteIssue> = all
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .collect();
        debug!(count = issues.len(), "listed remote issues");
        Ok(issues)
    }

    fn create_issue(
        &self,
        title: &str,
        body: Option<&str>,
        labels: &[String],
    ) -> Result<RemoteIssue> {
        #[derive(Serialize)]
        struct CreateIssueRequest<'a> {
            title: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            body: Option<&'a str>,
            #[serde(skip_serializing_if = "<[_]>::is_empty")]
            labels: &'a [String],
        }

        let url = self.repo_url("/issues");
        let request = CreateIssueRequest {
            title,
            body,
            labels,
        };
        Self::decode(self.send(self.http.post(&url).json(&request))?)
    }

    fn update_issue(&self, number: i64, changes: &RemoteIssueChanges) -> Result<RemoteIssue> {
        let url = self.repo_url(&format!("/issues/{number}"));
        Self::decode(self.send(self.http.patch(&url).json(changes))?)
    }

    fn list_comments(&self, number: i64) -> Result<Vec<RemoteComment>> {
        let url = self.repo_url(&format!("/issues/{number}/comments?per_page={PAGE_SIZE}"));
        Self::decode(self.send(self.http.get(&url))?)
    }

    fn add_comment(&self, number: i64, body: &str) -> Result<RemoteComment> {
        #[derive(Serialize)]
        struct CommentRequest<'a> {
            body: &'a str,
        }

        let url = self.repo_url(&format!("/issues/{number}/comments"));
        Self::decode(self.send(self.http.post(&url).json(&CommentRequest { body }))?)
    }

    fn list_labels(&self) -> Result<Vec<RemoteLabel>> {
        self.collect_pages(|page| self.repo_url(&format!("/labels?per_page={PAGE_SIZE}&page={page}")))
    }

    fn create_label(
        &self,
        name: &str,
        color: &str,
        description: Option<&str>,
    ) -> Result<RemoteLabel> {
        #[derive(Serialize)]
        struct CreateLabelRequest<'a> {
            name: &'a str,
            color: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            description: Option<&'a str>,
        }

        let url = self.repo_url("/labels");
        let request = CreateLabelRequest {
            name,
            color: normalize_color(color),
            description,
        };
        Self::decode(self.send(self.http.post(&url).json(&request))?)
    }

    fn delete_label(&self, name: &str) -> Result<()> {
        let url = self.repo_url(&format!("/labels/{}", urlencoding::encode(name)));
        self.send(self.http.delete(&url))?;
        Ok(())
    }

    fn upload_file(&self, filename: &str, content: &[u8]) -> Result<String> {
        #[derive(Serialize)]
        struct UploadRequest<'a> {
            message: String,
            content: String,
            branch: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            sha: Option<String>,
        }

        #[derive(Deserialize)]
        struct UploadResponse {
            content: Option<UploadedContent>,
        }

        #[derive(Deserialize)]
        struct UploadedContent {
            download_url: Option<String>,
        }

        let repo = self.validate_connection()?;
        let path = format!("{IMAGE_DIR}/{filename}");
        let request = UploadRequest {
            message: format!("Add image {filename}"),
            content: base64::engine::general_purpose::STANDARD.encode(content),
            branch: &repo.default_branch,
            sha: self.existing_file_sha(&path)?,
        };

        let url = self.repo_url(&format!("/contents/{path}"));
        let response: UploadResponse = Self::decode(self.send(self.http.put(&url).json(&request))?)?;
        response
            .content
            .and_then(|content| content.download_url)
            .ok_or_else(|| Error::Upload(format!("no download URL returned for {filename}")))
    }

    fn validate_connection(&self) -> Result<RemoteRepo> {
        Self::decode(self.send(self.http.get(self.repo_url("")))?)
    }
}

/// GitHub's label API takes hex colors without the leading hash.
pub fn normalize_color(color: &str) -> String {
    color.trim_start_matches('#').to_string()
}
