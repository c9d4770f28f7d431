use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow, bail};
use axel_capture::{
    AttachmentDownloader, AttachmentRef, Author, CONTEXT_LIMIT, CaptureStore, ChannelRef,
    ChatHistory, ChatMessage, MessageReference, SoftFailure, ThreadParent, capture_message,
    gather_context, resolve_target,
};
use axel_common::RepoList;
use chrono::DateTime;
use tempfile::tempdir;

#[derive(Default)]
struct FakePlatform {
    history: Vec<ChatMessage>,
    /// Rotate each page so it is neither oldest- nor newest-first.
    scramble_pages: bool,
    /// Return the anchor message itself in its own history page.
    include_anchor: bool,
    fail_history: bool,
    messages: HashMap<String, ChatMessage>,
    starter: Option<ChatMessage>,
    failing_downloads: HashSet<String>,
    pages_requested: RefCell<usize>,
    cursors: RefCell<Vec<String>>,
}

impl ChatHistory for FakePlatform {
    fn history_before(
        &self,
        _channel: &ChannelRef,
        before: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        *self.pages_requested.borrow_mut() += 1;
        self.cursors.borrow_mut().push(before.to_string());
        if self.fail_history {
            bail!("discord list messages failed: 503 upstream unavailable");
        }
        let before: u64 = before.parse()?;
        let mut page: Vec<ChatMessage> = self
            .history
            .iter()
            .filter(|msg| {
                let id: u64 = msg.id.parse().unwrap_or_default();
                id < before || (self.include_anchor && id == before)
            })
            .cloned()
            .collect();
        page.sort_by(|a, b| b.chronological_cmp(a));
        page.truncate(limit);
        if self.scramble_pages && !page.is_empty() {
            let mid = page.len() / 2;
            page.rotate_left(mid);
        }
        Ok(page)
    }

    fn fetch_message(&self, _channel: &ChannelRef, message_id: &str) -> Result<ChatMessage> {
        self.messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| anyhow!("discord fetch message failed: 404 Unknown Message"))
    }

    fn thread_starter(&self, _thread: &ChannelRef) -> Result<Option<ChatMessage>> {
        Ok(self.starter.clone())
    }
}

impl AttachmentDownloader for FakePlatform {
    fn download(&self, attachment: &AttachmentRef, destination: &Path) -> Result<()> {
        if self.failing_downloads.contains(&attachment.filename) {
            bail!("attachment download failed: 403");
        }
        fs::write(destination, format!("bytes of {}", attachment.filename))?;
        Ok(())
    }
}

fn channel(name: &str) -> ChannelRef {
    ChannelRef {
        id: "100".to_string(),
        name: Some(name.to_string()),
        guild_id: Some("1".to_string()),
        thread_parent: None,
    }
}

fn msg(id: u64, minute: u32, author: &str, content: &str) -> ChatMessage {
    let timestamp = DateTime::parse_from_rfc3339(&format!("2024-05-01T10:{minute:02}:00+00:00"))
        .expect("timestamp");
    ChatMessage {
        id: id.to_string(),
        channel: channel("axel"),
        author: Author::named(author),
        timestamp,
        link: format!("https://discord.com/channels/1/100/{id}"),
        content: content.to_string(),
        attachments: Vec::new(),
        reference: None,
    }
}

fn ids(messages: &[ChatMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}

#[test]
fn context_is_oldest_first_and_excludes_trigger() {
    let trigger = msg(10, 10, "alice", "@axel save this");
    let platform = FakePlatform {
        history: vec![
            msg(3, 3, "carol", "third"),
            msg(1, 1, "bob", "first"),
            trigger.clone(),
            msg(2, 2, "dave", "second"),
        ],
        scramble_pages: true,
        include_anchor: true,
        ..FakePlatform::default()
    };

    let window = gather_context(&platform, &trigger, &trigger);
    assert_eq!(ids(&window.messages), ["1", "2", "3"]);
    assert!(window.soft_failures.is_empty());
}

#[test]
fn keeps_the_five_most_recent_prior_messages() {
    let trigger = msg(20, 20, "alice", "@axel capture");
    let history: Vec<ChatMessage> = (1..=8)
        .map(|i| msg(i, i as u32, "bob", &format!("m{i}")))
        .collect();
    let platform = FakePlatform {
        history,
        scramble_pages: true,
        ..FakePlatform::default()
    };

    let window = gather_context(&platform, &trigger, &trigger);
    assert_eq!(window.messages.len(), CONTEXT_LIMIT);
    assert_eq!(ids(&window.messages), ["4", "5", "6", "7", "8"]);
    assert_eq!(*platform.pages_requested.borrow(), 1);
}

#[test]
fn pages_past_skewed_messages_and_dedupes_the_cursor() {
    let trigger = msg(1000, 30, "alice", "@axel capture");
    // A full first page of messages stamped after the trigger, except the
    // oldest, which becomes the next cursor and is returned again.
    let mut history: Vec<ChatMessage> = (951..=999)
        .map(|id| msg(id, 45, "bob", "edited later"))
        .collect();
    history.push(msg(950, 20, "carol", "cursor"));
    history.extend((940..950).map(|id| msg(id, (id - 930) as u32, "dave", "older")));
    let platform = FakePlatform {
        history,
        include_anchor: true,
        ..FakePlatform::default()
    };

    let window = gather_context(&platform, &trigger, &trigger);
    assert_eq!(ids(&window.messages), ["946", "947", "948", "949", "950"]);
    assert_eq!(*platform.pages_requested.borrow(), 2);
    assert_eq!(*platform.cursors.borrow(), ["1000", "950"]);
}

#[test]
fn reply_captures_the_referenced_message() {
    let original = msg(5, 5, "bob", "the idea worth keeping");
    let mut trigger = msg(9, 9, "alice", "@axel keep this");
    trigger.reference = Some(MessageReference {
        message_id: "5".to_string(),
        channel_id: Some("100".to_string()),
    });
    let platform = FakePlatform {
        history: vec![
            msg(4, 4, "carol", "before"),
            original.clone(),
            msg(7, 7, "dave", "after"),
            trigger.clone(),
        ],
        messages: HashMap::from([("5".to_string(), original.clone())]),
        ..FakePlatform::default()
    };

    let (target, failure) = resolve_target(&platform, &trigger);
    assert_eq!(target.id, "5");
    assert!(failure.is_none());

    let window = gather_context(&platform, &trigger, &target);
    assert_eq!(ids(&window.messages), ["4"]);
}

#[test]
fn unfetchable_reply_falls_back_to_trigger() {
    let mut trigger = msg(9, 9, "alice", "@axel keep this");
    trigger.reference = Some(MessageReference {
        message_id: "5".to_string(),
        channel_id: None,
    });
    let platform = FakePlatform::default();

    let (target, failure) = resolve_target(&platform, &trigger);
    assert_eq!(target.id, "9");
    assert!(matches!(failure, Some(SoftFailure::TransientFetch(_))));
}

#[test]
fn thread_opener_uses_starter_message_as_context() {
    let thread = ChannelRef {
        id: "300".to_string(),
        name: Some("capture-design".to_string()),
        guild_id: Some("1".to_string()),
        thread_parent: Some(ThreadParent {
            id: "100".to_string(),
            name: Some("axel".to_string()),
        }),
    };
    let mut trigger = msg(301, 30, "alice", "@axel thoughts?");
    trigger.channel = thread;
    let starter = msg(300, 29, "bob", "Should captures be encrypted?");
    let platform = FakePlatform {
        starter: Some(starter),
        ..FakePlatform::default()
    };

    let window = gather_context(&platform, &trigger, &trigger);
    assert_eq!(ids(&window.messages), ["300"]);
}

#[test]
fn history_failure_still_saves_capture_without_context() {
    let tmp = tempdir().expect("tempdir");
    let store = CaptureStore::with_root(tmp.path(), None);
    let trigger = msg(10, 10, "alice", "@axel remember the retro notes");
    let platform = FakePlatform {
        fail_history: true,
        ..FakePlatform::default()
    };

    let outcome =
        capture_message(&store, &platform, &RepoList::default(), &trigger).expect("capture");
    assert_eq!(outcome.context_len, 0);
    assert!(matches!(
        outcome.soft_failures.as_slice(),
        [SoftFailure::TransientFetch(_)]
    ));

    let text = store.read(&outcome.path).expect("read");
    assert!(!text.contains("## Context"));
    assert!(text.ends_with("@axel remember the retro notes\n"));
}

#[test]
fn attachment_failure_does_not_block_others() {
    let tmp = tempdir().expect("tempdir");
    let store = CaptureStore::with_root(tmp.path(), None);
    let mut trigger = msg(10, 10, "alice", "diagrams attached");
    trigger.attachments = vec![
        AttachmentRef {
            filename: "broken.png".to_string(),
            url: "https://cdn.example/broken.png".to_string(),
        },
        AttachmentRef {
            filename: "flow chart.png".to_string(),
            url: "https://cdn.example/flow.png".to_string(),
        },
    ];
    let platform = FakePlatform {
        failing_downloads: HashSet::from(["broken.png".to_string()]),
        ..FakePlatform::default()
    };

    let outcome =
        capture_message(&store, &platform, &RepoList::default(), &trigger).expect("capture");
    assert_eq!(outcome.attachments_saved, 1);
    assert!(outcome.soft_failures.iter().any(|failure| matches!(
        failure,
        SoftFailure::AttachmentDownload { filename, .. } if filename == "broken.png"
    )));

    let saved = tmp.path().join("axel/10/flow_chart.png");
    assert_eq!(
        fs::read_to_string(saved).expect("attachment"),
        "bytes of flow chart.png"
    );
    let text = store.read(&outcome.path).expect("read");
    assert!(text.contains("## Attachments\n- [flow chart.png](./10/flow_chart.png)"));
    assert!(!text.contains("broken.png"));
}

#[test]
fn capture_lists_matching_repositories_and_security_note() {
    let tmp = tempdir().expect("tempdir");
    let store = CaptureStore::with_root(tmp.path(), None);
    let mut trigger = msg(10, 10, "alice", "rotate the api keys");
    trigger.channel = channel("token-place");
    let repos = RepoList::new([
        "https://github.com/futuroptimist/token.place",
        "https://github.com/futuroptimist/axel",
    ]);
    let platform = FakePlatform {
        history: vec![msg(9, 9, "bob", "")],
        ..FakePlatform::default()
    };

    let outcome = capture_message(&store, &platform, &repos, &trigger).expect("capture");
    assert_eq!(outcome.path, tmp.path().join("token-place/10.md"));

    let text = store.read(&outcome.path).expect("read");
    assert!(text.starts_with("# alice\n\n- Channel: token-place\n"));
    assert!(text.contains("- Repository: https://github.com/futuroptimist/token.place\n"));
    assert!(!text.contains("- Repository: https://github.com/futuroptimist/axel"));
    assert!(text.contains("- Security: token.place is security-sensitive"));
    assert!(text.contains("## Context\n- bob @ 2024-05-01T10:09:00+00:00"));
    assert!(text.contains("  (no content)\n"));
}
