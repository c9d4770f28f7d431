use std::collections::HashSet;

use url::Url;

/// A repository URL split into the parts quests talk about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub url: String,
    /// `owner/repo` when the URL has both, otherwise the best single segment.
    pub slug: String,
    pub name: String,
}

impl RepoInfo {
    pub(crate) fn slug_contains(&self, keyword: &str) -> bool {
        self.slug.to_lowercase().contains(keyword)
    }
}

pub fn parse_repo(raw: &str) -> RepoInfo {
    let parsed = Url::parse(raw).ok().filter(|url| url.has_host());
    let segments: Vec<&str> = match &parsed {
        Some(url) => url.path().split('/').filter(|part| !part.is_empty()).collect(),
        None => raw.split('/').filter(|part| !part.is_empty()).collect(),
    };

    let (slug, name) = match segments.as_slice() {
        [owner, repo, ..] => (format!("{owner}/{repo}"), (*repo).to_string()),
        [only] => ((*only).to_string(), (*only).to_string()),
        [] => {
            let fallback = parsed
                .as_ref()
                .and_then(|url| url.host_str())
                .unwrap_or(raw)
                .to_string();
            (fallback.clone(), fallback)
        }
    };
    RepoInfo {
        url: raw.to_string(),
        slug,
        name,
    }
}

/// Parses `urls`, keeping the first entry of every slug (case-insensitive).
pub(crate) fn unique_repos<'a, I>(urls: I) -> Vec<RepoInfo>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(parse_repo)
        .filter(|info| seen.insert(info.slug.to_lowercase()))
        .collect()
}

/// `owner/repo` with any `.git` suffix dropped; `None` for blank input.
pub(crate) fn client_slug(raw: &str) -> Option<String> {
    if let Ok(url) = Url::parse(raw)
        && url.has_host()
    {
        let parts: Vec<&str> = url.path().split('/').filter(|part| !part.is_empty()).collect();
        match parts.as_slice() {
            [owner, repo, ..] => return Some(format!("{owner}/{}", strip_git(repo))),
            [only] => return Some(strip_git(only).to_string()),
            [] => {}
        }
    }

    let cleaned = raw.trim().trim_matches('/');
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.split_once('/') {
        Some((owner, rest)) => {
            let repo = rest.split('/').next().unwrap_or(rest);
            Some(format!("{owner}/{}", strip_git(repo)))
        }
        None => Some(cleaned.to_string()),
    }
}

fn strip_git(segment: &str) -> &str {
    segment.strip_suffix(".git").unwrap_or(segment)
}
