use axel_capture::{SearchHit, Summary};
use axel_quests::{ClientIntegration, QuestSuggestion};

pub fn search_report(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No captures found for '{query}'.");
    }
    let mut lines = vec![format!("Matches for '{query}':")];
    lines.extend(
        hits.iter()
            .map(|hit| format!("- {}: {}", hit.relative.display, hit.snippet)),
    );
    lines.join("\n")
}

pub fn summary_report(query: &str, summary: Option<&Summary>) -> String {
    let Some(summary) = summary else {
        return format!("No captures found for '{query}'.");
    };
    let relative = &summary.hit.relative.display;
    match &summary.text {
        Some(text) => format!("Summary for '{query}' ({relative}): {text}"),
        None => format!("Capture {relative} has no readable content to summarize."),
    }
}

pub fn quest_report(quests: &[QuestSuggestion]) -> String {
    if quests.is_empty() {
        return "No quests available".to_string();
    }
    let mut lines = Vec::new();
    for quest in quests {
        lines.push(format!("- {}", quest.summary));
        lines.push(format!("  repos: {}", quest.repos.join(", ")));
        lines.push(format!("  quest: {}", quest.details));
        if let Some(model) = &quest.featured_model {
            lines.push(format!("  token.place model: {model}"));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn integration_report(plans: &[ClientIntegration]) -> String {
    if plans.is_empty() {
        return "No token.place repositories configured".to_string();
    }
    let mut lines = Vec::new();
    for plan in plans {
        lines.push(format!("- {} ↔ {}", plan.token_repo, plan.client_repo));
        lines.push(format!("  quest: {}", plan.detail));
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn models_report(models: &[String]) -> String {
    if models.is_empty() {
        return "No models available".to_string();
    }
    let mut lines = vec!["Available models:".to_string()];
    lines.extend(models.iter().map(|model| format!("- {model}")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use axel_capture::{Capture, CaptureStore, search, summarize};
    use axel_quests::suggest;

    use super::*;

    fn store_with_capture(root: &std::path::Path, body: &str) -> CaptureStore {
        let store = CaptureStore::with_root(root, None);
        store
            .save(&Capture {
                message_id: "42".to_string(),
                channel: "axel".to_string(),
                thread: None,
                author: "alice".to_string(),
                timestamp: "2024-05-01T12:00:00+00:00".to_string(),
                link: String::new(),
                body: body.to_string(),
                attachments: Vec::new(),
                repositories: Vec::new(),
                security_note: None,
                context: Vec::new(),
            })
            .expect("save");
        store
    }

    #[test]
    fn search_report_lists_relative_paths() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_with_capture(tmp.path(), "ship the release notes");
        let hits = search(&store, "release", 5);
        assert_eq!(
            search_report("release", &hits),
            "Matches for 'release':\n- axel/42.md: ship the release notes"
        );
        assert_eq!(
            search_report("nothing", &[]),
            "No captures found for 'nothing'."
        );
    }

    #[test]
    fn summary_report_handles_empty_bodies() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_with_capture(tmp.path(), "");
        let summary = summarize(&store, "alice");
        assert_eq!(
            summary_report("alice", summary.as_ref()),
            "Capture axel/42.md has no readable content to summarize."
        );
    }

    #[test]
    fn quest_report_prints_each_suggestion() {
        let quests = suggest(["https://github.com/x/alpha", "https://github.com/x/beta"], 1, None);
        let report = quest_report(&quests);
        assert!(report.starts_with("- Link x/alpha ↔ x/beta\n  repos: x/alpha, x/beta\n  quest: "));
        assert!(!report.contains("token.place model"));
        assert_eq!(quest_report(&[]), "No quests available");
    }

    #[test]
    fn models_report_lists_models() {
        assert_eq!(
            models_report(&["a".to_string(), "b".to_string()]),
            "Available models:\n- a\n- b"
        );
        assert_eq!(models_report(&[]), "No models available");
    }
}
