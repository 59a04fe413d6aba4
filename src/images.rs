//! Markdown image URL rewriting.
//!
//! Issue bodies are stored and edited with short `/img/<name>` paths;
//! before a body is pushed to GitHub the short paths are expanded back to
//! raw content URLs under `.github/images/` on the main branch. The two
//! rewrites are exact inverses for bodies that only reference that
//! directory.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::RepoConfig;

static SHORT_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(/img/([^)\s]+)\)").unwrap_or_else(|err| {
        unreachable!("short image regex is valid: {err}");
    })
});

fn raw_base(config: &RepoConfig) -> String {
    format!(
        "https://raw.githubusercontent.com/{}/{}/main/.github/images/",
        config.owner, config.repo
    )
}

/// Replace raw content URLs for the repository's image directory with
/// `/img/` short paths. Other URLs pass through untouched.
pub fn hide_image_urls(body: &str, config: &RepoConfig) -> String {
    body.replace(&raw_base(config), "/img/")
}

/// Replace `![alt](/img/name)` references with full raw content URLs.
pub fn expand_image_urls(body: &str, config: &RepoConfig) -> String {
    let base = raw_base(config);
    SHORT_IMAGE_RE
        .replace_all(body, |caps: &regex::Captures<'_>| {
            format!("![{}]({}{})", &caps[1], base, &caps[2])
        })
        .into_owned()
}
