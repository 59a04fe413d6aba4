use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Priority;

const MIN_REQUEST_TIMEOUT_SECS: u64 = 5;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PRIORITY: &str = "MEDIUM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Empty means the platform-default data directory.
    pub database_path: String,
    pub request_timeout_secs: u64,
    pub default_priority: String,
    pub sync_on_list: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_priority: DEFAULT_PRIORITY.to_string(),
            sync_on_list: true,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("issueboard");
        path.push("settings.toml");
        Some(path)
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        Self::load_from_path(&path)
    }

    fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(mut settings) => {
                    settings.validate();
                    settings
                }
                Err(error) => {
                    warn!(
                        "failed to parse settings config '{}': {}",
                        path.display(),
                        error
                    );
                    Self::default()
                }
            },
            Err(error) => {
                warn!(
                    "failed to read settings config '{}': {}",
                    path.display(),
                    error
                );
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().ok_or_else(|| anyhow!("unable to determine config path"))?;
        self.save_to_path(&path)
    }

    fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("invalid settings config path"))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory '{}'", parent.display()))?;

        let mut validated = self.clone();
        validated.validate();
        let contents =
            toml::to_string_pretty(&validated).context("failed to serialize settings to TOML")?;

        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("invalid settings config file name"))?
            .to_string_lossy()
            .to_string();
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, contents).with_context(|| {
            format!(
                "failed to write temporary settings file '{}'",
                tmp_path.display()
            )
        })?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to atomically rename settings file '{}' to '{}'",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// The sqlite file to open, honoring a configured override.
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        if !self.database_path.trim().is_empty() {
            return Ok(PathBuf::from(self.database_path.trim()));
        }
        let data_dir =
            dirs::data_local_dir().ok_or_else(|| anyhow!("unable to determine data directory"))?;
        Ok(data_dir.join("issueboard").join("issueboard.sqlite"))
    }

    pub fn default_priority(&self) -> Priority {
        Priority::from_str(&self.default_priority).unwrap_or(Priority::Medium)
    }

    fn validate(&mut self) {
        self.request_timeout_secs = self
            .request_timeout_secs
            .clamp(MIN_REQUEST_TIMEOUT_SECS, MAX_REQUEST_TIMEOUT_SECS);

        self.default_priority = match Priority::from_str(&self.default_priority) {
            Ok(priority) => priority.as_str().to_string(),
            Err(()) => {
                warn!(
                    "invalid default_priority '{}' in settings config; falling back to {}",
                    self.default_priority, DEFAULT_PRIORITY
                );
                DEFAULT_PRIORITY.to_string()
            }
        };
    }
}
