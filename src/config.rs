//! Active repository resolution.
//!
//! The repository is re-read on every remote operation so a settings
//! change takes effect without a restart. A database row wins over the
//! environment; a row with an empty owner or repo counts as absent.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::Database;
use crate::types::RepoConfig;

pub const REPO_SETTING_KEY: &str = "github_repo";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRepo {
    owner: String,
    repo: String,
}

pub fn resolve_repo(db: &Database) -> Result<RepoConfig> {
    if let Some(raw) = db.get_setting(REPO_SETTING_KEY)? {
        match serde_json::from_str::<StoredRepo>(&raw) {
            Ok(stored) => {
                let config = RepoConfig::new(stored.owner, stored.repo);
                if config.is_configured() {
                    return Ok(config);
                }
            }
            Err(err) => {
                warn!(error = %err, "ignoring malformed {REPO_SETTING_KEY} setting");
            }
        }
    }

    let owner = std::env::var("GITHUB_OWNER").unwrap_or_default();
    let repo = std::env::var("GITHUB_REPO").unwrap_or_default();
    Ok(RepoConfig::new(owner, repo))
}

pub fn save_repo(db: &Database, config: &RepoConfig) -> Result<()> {
    let stored = StoredRepo {
        owner: config.owner.clone(),
        repo: config.repo.clone(),
    };
    let raw = serde_json::to_string(&stored).context("failed to encode repository setting")?;
    db.set_setting(REPO_SETTING_KEY, &raw)
}
