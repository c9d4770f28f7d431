use std::cmp::Ordering;

use axel_common::RepoList;
use axel_common::repos::{SECURITY_PROJECT, is_sensitive, repo_slug};
use chrono::{DateTime, FixedOffset};

const DIRECT_MESSAGE_CHANNEL: &str = "direct-message";
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    /// Guild nickname or other per-server display name.
    pub display_name: Option<String>,
    pub global_name: Option<String>,
    pub username: Option<String>,
}

impl Author {
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// First non-blank of display name, global name, username, folded onto
    /// one line.
    pub fn heading_name(&self) -> String {
        [&self.display_name, &self.global_name, &self.username]
            .into_iter()
            .flatten()
            .map(|value| single_line(value))
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Collapses every whitespace run, newlines included, into one space.
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadParent {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: String,
    pub name: Option<String>,
    pub guild_id: Option<String>,
    /// Present only when this channel is a thread.
    pub thread_parent: Option<ThreadParent>,
}

impl ChannelRef {
    pub fn is_thread(&self) -> bool {
        self.thread_parent.is_some()
    }

    /// `(channel, thread)` names as shown in capture metadata. Threads report
    /// their parent as the channel.
    pub fn metadata(&self) -> (String, Option<String>) {
        let own_name = self
            .name
            .as_deref()
            .map(single_line)
            .filter(|name| !name.is_empty());
        match &self.thread_parent {
            Some(parent) => {
                let parent_name = parent
                    .name
                    .as_deref()
                    .map(single_line)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| UNKNOWN.to_string());
                (parent_name, own_name)
            }
            None => (
                own_name.unwrap_or_else(|| DIRECT_MESSAGE_CHANNEL.to_string()),
                None,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReference {
    pub message_id: String,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub channel: ChannelRef,
    pub author: Author,
    pub timestamp: DateTime<FixedOffset>,
    pub link: String,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    pub reference: Option<MessageReference>,
}

impl ChatMessage {
    /// Chronological order: timestamp, then numeric id for equal timestamps.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| numeric_id(&self.id).cmp(&numeric_id(&other.id)))
            .then_with(|| self.id.cmp(&other.id))
    }
}

fn numeric_id(id: &str) -> u64 {
    id.parse::<u64>().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub author: String,
    pub timestamp: String,
    pub link: String,
    pub body: String,
}

impl From<&ChatMessage> for ContextEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            author: message.author.heading_name(),
            timestamp: message.timestamp.to_rfc3339(),
            link: message.link.clone(),
            body: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAttachment {
    pub display_name: String,
    /// Relative to the channel directory, e.g. `1234/diagram.png`.
    pub relative_path: String,
}

/// One persisted chat message plus its context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub message_id: String,
    pub channel: String,
    pub thread: Option<String>,
    pub author: String,
    pub timestamp: String,
    pub link: String,
    pub body: String,
    pub attachments: Vec<SavedAttachment>,
    pub repositories: Vec<String>,
    pub security_note: Option<String>,
    /// Oldest first.
    pub context: Vec<ContextEntry>,
}

impl Capture {
    /// Builds a capture for `message`. `context` must already be the ordered
    /// window produced by the gatherer.
    pub fn build(
        message: &ChatMessage,
        context: &[ChatMessage],
        attachments: Vec<SavedAttachment>,
        repos: &RepoList,
    ) -> Self {
        let (channel, thread) = message.channel.metadata();
        let repositories = repos.matching(Some(&channel), thread.as_deref());
        let security_note = security_note(&repositories);
        Self {
            message_id: message.id.clone(),
            channel,
            thread,
            author: message.author.heading_name(),
            timestamp: message.timestamp.to_rfc3339(),
            link: message.link.clone(),
            body: message.content.clone(),
            attachments,
            repositories,
            security_note,
            context: context.iter().map(ContextEntry::from).collect(),
        }
    }
}

fn security_note(repositories: &[String]) -> Option<String> {
    let sensitive: Vec<&str> = repositories
        .iter()
        .filter(|url| is_sensitive(url))
        .filter_map(|url| repo_slug(url))
        .collect();
    if sensitive.is_empty() {
        return None;
    }
    Some(format!(
        "{} is security-sensitive; loop in {SECURITY_PROJECT} before sharing credentials or auth details",
        sensitive.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_name_follows_priority_chain() {
        let mut author = Author {
            display_name: Some("  ".to_string()),
            global_name: None,
            username: Some("bob".to_string()),
        };
        assert_eq!(author.heading_name(), "bob");
        author.global_name = Some("Bobby".to_string());
        assert_eq!(author.heading_name(), "Bobby");
        assert_eq!(Author::default().heading_name(), "unknown");
    }

    #[test]
    fn heading_name_is_folded_onto_one_line() {
        let author = Author {
            display_name: Some(" Alice\n- Channel: fake\t ".to_string()),
            ..Author::default()
        };
        assert_eq!(author.heading_name(), "Alice - Channel: fake");
        assert_eq!(Author::named("\n\n").heading_name(), "unknown");
    }

    #[test]
    fn thread_metadata_reports_parent_channel() {
        let thread = ChannelRef {
            id: "2".to_string(),
            name: Some("design-review".to_string()),
            guild_id: None,
            thread_parent: Some(ThreadParent {
                id: "1".to_string(),
                name: Some("axel".to_string()),
            }),
        };
        assert_eq!(
            thread.metadata(),
            ("axel".to_string(), Some("design-review".to_string()))
        );
        assert_eq!(
            ChannelRef::default().metadata(),
            ("direct-message".to_string(), None)
        );
    }

    #[test]
    fn security_note_only_for_sensitive_repositories() {
        assert!(security_note(&["https://github.com/x/axel".to_string()]).is_none());
        let note = security_note(&["https://github.com/x/token.place".to_string()])
            .expect("sensitive");
        assert!(note.contains("token.place"));
        assert!(note.contains("gabriel"));
    }
}
