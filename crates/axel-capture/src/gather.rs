use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::SoftFailure;
use crate::model::ChatMessage;
use crate::platform::ChatHistory;

/// Maximum number of prior messages kept with a capture.
pub const CONTEXT_LIMIT: usize = 5;
const PAGE_SIZE: usize = 50;
const MAX_PAGES: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    /// Oldest first, at most `CONTEXT_LIMIT` entries.
    pub messages: Vec<ChatMessage>,
    pub soft_failures: Vec<SoftFailure>,
}

/// Returns the message a mention points at: the replied-to message when the
/// trigger is a reply and it can be fetched, otherwise the trigger itself.
pub fn resolve_target<H>(history: &H, trigger: &ChatMessage) -> (ChatMessage, Option<SoftFailure>)
where
    H: ChatHistory + ?Sized,
{
    let Some(reference) = &trigger.reference else {
        return (trigger.clone(), None);
    };
    if reference.message_id == trigger.id {
        return (trigger.clone(), None);
    }
    match history.fetch_message(&trigger.channel, &reference.message_id) {
        Ok(original) => (original, None),
        Err(err) => {
            warn!(
                message_id = %reference.message_id,
                error = %err,
                "could not fetch replied-to message; capturing the mention instead"
            );
            (
                trigger.clone(),
                Some(SoftFailure::TransientFetch(format!("{err:#}"))),
            )
        }
    }
}

/// Collects up to `CONTEXT_LIMIT` messages preceding `target`, oldest first.
///
/// Both `trigger` and `target` are excluded. History errors degrade to an
/// empty window; a failed thread-starter lookup only drops the starter.
pub fn gather_context<H>(history: &H, trigger: &ChatMessage, target: &ChatMessage) -> ContextWindow
where
    H: ChatHistory + ?Sized,
{
    let excluded: HashSet<&str> = [trigger.id.as_str(), target.id.as_str()].into();
    let mut window = ContextWindow::default();

    let mut eligible = match collect_history(history, target, &excluded) {
        Ok(messages) => messages,
        Err(err) => {
            warn!(
                channel_id = %target.channel.id,
                error = %err,
                "history fetch failed; saving capture without context"
            );
            window
                .soft_failures
                .push(SoftFailure::TransientFetch(format!("{err:#}")));
            return window;
        }
    };

    if target.channel.is_thread() && eligible.len() < CONTEXT_LIMIT {
        match history.thread_starter(&target.channel) {
            Ok(Some(starter)) => {
                if !excluded.contains(starter.id.as_str())
                    && !eligible.iter().any(|msg| msg.id == starter.id)
                {
                    eligible.push(starter);
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    thread_id = %target.channel.id,
                    error = %err,
                    "thread starter lookup failed"
                );
                window
                    .soft_failures
                    .push(SoftFailure::TransientFetch(format!("{err:#}")));
            }
        }
    }

    eligible.sort_by(ChatMessage::chronological_cmp);
    if eligible.len() > CONTEXT_LIMIT {
        eligible.drain(..eligible.len() - CONTEXT_LIMIT);
    }
    debug!(count = eligible.len(), "gathered capture context");
    window.messages = eligible;
    window
}

fn collect_history<H>(
    history: &H,
    target: &ChatMessage,
    excluded: &HashSet<&str>,
) -> anyhow::Result<Vec<ChatMessage>>
where
    H: ChatHistory + ?Sized,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut eligible = Vec::new();
    let mut before = target.id.clone();

    for _ in 0..MAX_PAGES {
        let page = history.history_before(&target.channel, &before, PAGE_SIZE)?;
        if page.is_empty() {
            break;
        }
        let page_len = page.len();
        let oldest = page
            .iter()
            .min_by(|a, b| a.chronological_cmp(b))
            .map(|msg| msg.id.clone());

        for message in page {
            if excluded.contains(message.id.as_str()) || message.timestamp > target.timestamp {
                continue;
            }
            if seen.insert(message.id.clone()) {
                eligible.push(message);
            }
        }

        if eligible.len() >= CONTEXT_LIMIT || page_len < PAGE_SIZE {
            break;
        }
        match oldest {
            Some(next) if next != before => before = next,
            _ => break,
        }
    }
    Ok(eligible)
}
