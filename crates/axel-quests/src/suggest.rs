use std::cmp::Ordering;

use axel_common::repos::SECURITY_PROJECT;
use tracing::debug;

use crate::repo::{RepoInfo, unique_repos};
use crate::token_place::{ModelCatalog, quest_detail};

pub const DEFAULT_LIMIT: usize = 3;

/// Appended to every quest that touches the security project.
pub const SECURITY_RATIONALE: &str = "Keep gabriel in the loop as a second line of defense so credentials and auth flows get reviewed before they ship.";

const TOKEN_KEYWORD: &str = "token";

const KEYWORD_TEMPLATES: [(&str, &str); 3] = [
    (
        "gabriel",
        "{primary} can feed security intelligence into {secondary} so quests ship with guardrails.",
    ),
    (
        "blog",
        "Use {primary} to publish a cross-repo recap that highlights breakthroughs from {secondary}.",
    ),
    (
        "discord",
        "Route conversations captured by {primary} into {secondary}'s planning docs to keep quests aligned.",
    ),
];

const DEFAULT_TEMPLATE: &str =
    "Plan a quest where {primary} and {secondary} share context to unlock a cross-repo improvement.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestSuggestion {
    /// The two slugs, ordered case-insensitively.
    pub repos: Vec<String>,
    pub urls: Vec<String>,
    pub summary: String,
    pub details: String,
    pub featured_model: Option<String>,
}

enum Plan {
    /// Detail depends on the featured model, so it is rendered late.
    TokenPlace { token_is_primary: bool },
    Fixed(String),
}

struct Pairing {
    primary: RepoInfo,
    secondary: RepoInfo,
    plan: Plan,
    score: u8,
}

impl Pairing {
    fn new(left: &RepoInfo, right: &RepoInfo) -> Self {
        let (primary, secondary) = if left.slug.to_lowercase() <= right.slug.to_lowercase() {
            (left.clone(), right.clone())
        } else {
            (right.clone(), left.clone())
        };
        let (plan, score) = select_plan(&primary, &secondary);
        Self {
            primary,
            secondary,
            plan,
            score,
        }
    }

    fn rank(&self, other: &Self) -> Ordering {
        other.score.cmp(&self.score).then_with(|| {
            (&self.primary.slug, &self.secondary.slug)
                .cmp(&(&other.primary.slug, &other.secondary.slug))
        })
    }

    fn finish(self, featured: Option<&str>) -> QuestSuggestion {
        let (mut details, featured_model) = match self.plan {
            Plan::TokenPlace { token_is_primary } => {
                let (token, other) = if token_is_primary {
                    (&self.primary, &self.secondary)
                } else {
                    (&self.secondary, &self.primary)
                };
                (
                    quest_detail(&token.slug, &other.slug, featured),
                    featured.map(str::to_string),
                )
            }
            Plan::Fixed(text) => (text, None),
        };
        if self.primary.slug_contains(SECURITY_PROJECT)
            || self.secondary.slug_contains(SECURITY_PROJECT)
        {
            details.push(' ');
            details.push_str(SECURITY_RATIONALE);
        }

        let mut summary = format!("Link {} ↔ {}", self.primary.slug, self.secondary.slug);
        if let Some(model) = &featured_model {
            summary.push_str(&format!(" via {model}"));
        }
        QuestSuggestion {
            repos: vec![self.primary.slug, self.secondary.slug],
            urls: vec![self.primary.url, self.secondary.url],
            summary,
            details,
            featured_model,
        }
    }
}

/// Token pairings win over keyword pairings, which win over the default.
fn select_plan(primary: &RepoInfo, secondary: &RepoInfo) -> (Plan, u8) {
    if primary.slug_contains(TOKEN_KEYWORD) {
        return (Plan::TokenPlace { token_is_primary: true }, 1);
    }
    if secondary.slug_contains(TOKEN_KEYWORD) {
        return (Plan::TokenPlace { token_is_primary: false }, 1);
    }

    for (repo, other) in [(primary, secondary), (secondary, primary)] {
        for (keyword, template) in KEYWORD_TEMPLATES {
            if repo.slug_contains(keyword) {
                return (Plan::Fixed(fill(template, &repo.slug, &other.slug)), 1);
            }
        }
    }
    (
        Plan::Fixed(fill(DEFAULT_TEMPLATE, &primary.slug, &secondary.slug)),
        0,
    )
}

fn fill(template: &str, primary: &str, secondary: &str) -> String {
    template
        .replace("{primary}", primary)
        .replace("{secondary}", secondary)
}

/// Suggests up to `limit` quests linking two repositories each.
///
/// Output depends only on `repos` and, for token.place pairings, on the
/// catalog's answer. The catalog is asked at most once per call.
pub fn suggest<'a, I>(
    repos: I,
    limit: usize,
    catalog: Option<&dyn ModelCatalog>,
) -> Vec<QuestSuggestion>
where
    I: IntoIterator<Item = &'a str>,
{
    if limit == 0 {
        return Vec::new();
    }
    let unique = unique_repos(repos);
    if unique.len() < 2 {
        return Vec::new();
    }

    let mut pairings = Vec::new();
    for (index, left) in unique.iter().enumerate() {
        for right in &unique[index + 1..] {
            pairings.push(Pairing::new(left, right));
        }
    }
    pairings.sort_by(Pairing::rank);
    pairings.truncate(limit);

    let wants_model = pairings
        .iter()
        .any(|pairing| matches!(pairing.plan, Plan::TokenPlace { .. }));
    let featured = if wants_model {
        catalog.and_then(|catalog| catalog.featured_model())
    } else {
        None
    };
    debug!(
        suggestions = pairings.len(),
        featured = featured.as_deref().unwrap_or("none"),
        "quest suggestions ranked"
    );

    pairings
        .into_iter()
        .map(|pairing| pairing.finish(featured.as_deref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_pairs_outrank_default_pairs() {
        let quests = suggest(
            [
                "https://github.com/x/alpha",
                "https://github.com/x/beta",
                "https://github.com/x/blog",
            ],
            3,
            None,
        );
        let summaries: Vec<&str> = quests.iter().map(|quest| quest.summary.as_str()).collect();
        assert_eq!(
            summaries,
            [
                "Link x/alpha ↔ x/blog",
                "Link x/beta ↔ x/blog",
                "Link x/alpha ↔ x/beta",
            ]
        );
        assert_eq!(
            quests[0].details,
            "Use x/blog to publish a cross-repo recap that highlights breakthroughs from x/alpha."
        );
    }

    #[test]
    fn token_template_wins_over_other_keywords() {
        let quests = suggest(
            ["https://github.com/x/discord-bot", "https://github.com/x/token.place"],
            1,
            None,
        );
        assert_eq!(
            quests[0].details,
            "x/token.place can broker token.place auth while gabriel audits secrets so x/discord-bot ships safely."
        );
        assert!(quests[0].featured_model.is_none());
    }

    #[test]
    fn pairs_are_ordered_by_lowercase_slug() {
        let quests = suggest(["https://github.com/x/Zeta", "https://github.com/x/alpha"], 1, None);
        assert_eq!(quests[0].repos, ["x/alpha", "x/Zeta"]);
        assert_eq!(
            quests[0].urls,
            ["https://github.com/x/alpha", "https://github.com/x/Zeta"]
        );
    }
}
