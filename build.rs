fn normalized_version(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(without_prefix) = trimmed.strip_prefix('v')
        && without_prefix
            .chars()
            .next()
            .is_some_and(|ch| ch.is_ascii_digit())
    {
        return without_prefix.to_string();
    }
    trimmed.to_string()
}

fn build_version() -> String {
    if let Ok(version) = std::env::var("ISSUEBOARD_VERSION") {
        let normalized = normalized_version(&version);
        if !normalized.is_empty() {
            return normalized;
        }
    }

    env!("CARGO_PKG_VERSION").to_string()
}

fn main() {
    println!("cargo:rerun-if-env-changed=ISSUEBOARD_VERSION");

    let version = build_version();
    println!("cargo:rustc-env=ISSUEBOARD_BUILD_VERSION={version}");
}
