use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

/// Repository names treated as security/identity sensitive.
pub const SENSITIVE_REPOS: &[&str] = &["token.place", "gabriel"];

/// The project that reviews security-sensitive work.
pub const SECURITY_PROJECT: &str = "gabriel";

/// Ordered, case-insensitively unique set of repository URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoList {
    urls: Vec<String>,
}

impl RepoList {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut unique: Vec<String> = Vec::new();
        for url in urls {
            let url: String = url.into();
            let trimmed = url.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if seen.insert(trimmed.to_lowercase()) {
                unique.push(trimmed.to_string());
            }
        }
        unique.sort_by_key(|url| url.to_lowercase());
        Self { urls: unique }
    }

    /// Loads a flat list file. A missing file is an empty list.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "repository list missing; using empty list");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(Self::new(raw.lines()))
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Repositories whose slug matches the channel or thread name, channel
    /// matches first.
    pub fn matching(&self, channel: Option<&str>, thread: Option<&str>) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for value in [channel, thread].into_iter().flatten() {
            let key = normalize_key(value);
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }

        let mut matches = Vec::new();
        for key in &keys {
            for url in &self.urls {
                let Some(slug) = repo_slug(url) else {
                    continue;
                };
                if normalize_key(slug) == *key && !matches.contains(url) {
                    matches.push(url.clone());
                }
            }
        }
        matches
    }
}

/// Last path segment of a repository URL, without a `.git` suffix.
pub fn repo_slug(url: &str) -> Option<&str> {
    let segment = url.trim().trim_end_matches('/').rsplit('/').next()?;
    let segment = segment.strip_suffix(".git").unwrap_or(segment);
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}

pub fn is_sensitive(url: &str) -> bool {
    repo_slug(url).is_some_and(|slug| {
        let slug = slug.to_lowercase();
        SENSITIVE_REPOS.iter().any(|name| slug == *name)
    })
}

/// Lowercase alphanumerics only; used to compare channel names to slugs.
pub fn normalize_key(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
