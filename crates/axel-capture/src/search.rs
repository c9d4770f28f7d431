use std::path::PathBuf;

use axel_common::paths::{RelativePath, relativize};
use tracing::warn;
use walkdir::WalkDir;

use crate::markdown::{ATTACHMENTS_HEADING, CONTEXT_HEADING, METADATA_PREFIXES};
use crate::store::{CAPTURE_EXTENSION, CaptureStore};

pub const SNIPPET_MAX_CHARS: usize = 120;
pub const SUMMARY_MAX_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: PathBuf,
    pub relative: RelativePath,
    /// First matching line, trimmed and shortened.
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub hit: SearchHit,
    /// `None` when the capture has no body worth summarizing.
    pub text: Option<String>,
}

/// Case-insensitive substring search over every capture file, in traversal
/// order, capped at `limit` hits.
pub fn search(store: &CaptureStore, query: &str, limit: usize) -> Vec<SearchHit> {
    let root = store.root();
    if limit == 0 || !root.is_dir() {
        return Vec::new();
    }

    let needle = query.to_lowercase();
    let mut hits = Vec::new();
    // Captures live exactly at <root>/<channel>/<id>.md; deeper files are
    // attachments.
    let walker = WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable capture entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some(CAPTURE_EXTENSION)
        {
            continue;
        }
        let text = match store.decode(path) {
            Ok(decoded) => match decoded.into_text() {
                Some(text) => text,
                None => continue,
            },
            Err(err) => {
                warn!(error = %err, "skipping unreadable capture");
                continue;
            }
        };
        let Some(line) = text
            .lines()
            .find(|line| line.to_lowercase().contains(&needle))
        else {
            continue;
        };

        hits.push(SearchHit {
            path: path.to_path_buf(),
            relative: relativize(root, path),
            snippet: shorten(line.trim(), SNIPPET_MAX_CHARS),
        });
        if hits.len() >= limit {
            break;
        }
    }
    hits
}

/// Summarizes the first capture matching `query`. `None` means no match.
pub fn summarize(store: &CaptureStore, query: &str) -> Option<Summary> {
    let hit = search(store, query, 1).into_iter().next()?;
    let text = match store.read(&hit.path) {
        Ok(text) => extract_body(&text).map(|body| shorten(&body, SUMMARY_MAX_CHARS)),
        Err(err) => {
            warn!(error = %err, "matched capture became unreadable");
            None
        }
    };
    Some(Summary { hit, text })
}

/// Returns the trigger message body of a rendered capture.
///
/// The layout is positional: heading, blank line, metadata block, optional
/// `## Context` block, body, optional attachments block. Blocks end at the
/// first empty line, so body text that looks like metadata is kept.
pub fn extract_body(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut index = skip_blank(&lines, 0);

    if lines.get(index).is_some_and(|line| line.starts_with("# ")) {
        index = skip_blank(&lines, index + 1);
        if lines.get(index).is_some_and(|line| {
            METADATA_PREFIXES
                .iter()
                .any(|prefix| line.starts_with(prefix))
        }) {
            index = skip_block(&lines, index);
            index = skip_blank(&lines, index);
        }
        if lines.get(index).is_some_and(|line| line.trim() == CONTEXT_HEADING) {
            index = skip_block(&lines, index + 1);
            index = skip_blank(&lines, index);
        }
    }

    let end = attachments_start(&lines[index..]).map_or(lines.len(), |offset| index + offset);
    let body = lines[index..end].join("\n");
    let body = body.trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

fn skip_blank(lines: &[&str], mut index: usize) -> usize {
    while lines.get(index).is_some_and(|line| line.trim().is_empty()) {
        index += 1;
    }
    index
}

/// Context body lines are indented, so only a truly empty line ends a block.
fn skip_block(lines: &[&str], mut index: usize) -> usize {
    while lines.get(index).is_some_and(|line| !line.is_empty()) {
        index += 1;
    }
    index
}

/// Offset of a trailing attachments block: the heading followed only by
/// attachment links or blank lines.
fn attachments_start(lines: &[&str]) -> Option<usize> {
    let start = lines
        .iter()
        .rposition(|line| line.trim() == ATTACHMENTS_HEADING)?;
    let all_links = lines[start + 1..]
        .iter()
        .all(|line| line.trim().is_empty() || is_attachment_link(line.trim()));
    all_links.then_some(start)
}

fn is_attachment_link(line: &str) -> bool {
    line.starts_with("- [")
        && line.ends_with(')')
        && (line.contains("](./") || line.contains("](../"))
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
