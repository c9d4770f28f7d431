use crate::model::Capture;

pub(crate) const CONTEXT_HEADING: &str = "## Context";
pub(crate) const ATTACHMENTS_HEADING: &str = "## Attachments";
pub(crate) const EMPTY_BODY_PLACEHOLDER: &str = "(no content)";

/// Bullet prefixes of the metadata block.
pub(crate) const METADATA_PREFIXES: &[&str] = &[
    "- Channel:",
    "- Thread:",
    "- Repository:",
    "- Security:",
    "- Timestamp:",
    "- Link:",
];

/// Renders `capture` in the on-disk layout. Output depends only on the
/// capture, so identical captures render byte-identically.
pub fn render(capture: &Capture) -> String {
    let mut lines: Vec<String> = vec![format!("# {}", capture.author), String::new()];

    lines.push(format!("- Channel: {}", capture.channel));
    if let Some(thread) = &capture.thread {
        lines.push(format!("- Thread: {thread}"));
    }
    for repo in &capture.repositories {
        lines.push(format!("- Repository: {repo}"));
    }
    if let Some(note) = &capture.security_note {
        lines.push(format!("- Security: {note}"));
    }
    lines.push(format!("- Timestamp: {}", capture.timestamp));
    if !capture.link.is_empty() {
        lines.push(format!("- Link: {}", capture.link));
    }
    lines.push(String::new());

    if !capture.context.is_empty() {
        lines.push(CONTEXT_HEADING.to_string());
        for entry in &capture.context {
            let mut header = format!("- {}", entry.author);
            if !entry.timestamp.is_empty() {
                header.push_str(&format!(" @ {}", entry.timestamp));
            }
            if !entry.link.is_empty() {
                header.push_str(&format!(" ({})", entry.link));
            }
            lines.push(header);
            if entry.body.trim().is_empty() {
                lines.push(format!("  {EMPTY_BODY_PLACEHOLDER}"));
            } else {
                // Every body line stays indented so the block has no blank gaps.
                lines.extend(entry.body.lines().map(|line| format!("  {line}")));
            }
        }
        lines.push(String::new());
    }

    lines.push(capture.body.clone());
    lines.push(String::new());

    if !capture.attachments.is_empty() {
        lines.push(ATTACHMENTS_HEADING.to_string());
        for attachment in &capture.attachments {
            lines.push(format!(
                "- [{}](./{})",
                attachment.display_name, attachment.relative_path
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Replaces every run of characters outside `[A-Za-z0-9._-]` with `_`.
/// Blank and dot-only results become `unknown`.
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    if out.is_empty() || out.chars().all(|ch| ch == '.') {
        return "unknown".to_string();
    }
    out
}
