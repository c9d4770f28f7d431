use std::path::Path;

use anyhow::Result;

use crate::model::{AttachmentRef, ChannelRef, ChatMessage};

/// Read access to a chat platform's message history.
pub trait ChatHistory {
    /// One page of messages posted before `before` in `channel`. Pages are
    /// usually newest first, but callers must not rely on it.
    fn history_before(
        &self,
        channel: &ChannelRef,
        before: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>>;

    fn fetch_message(&self, channel: &ChannelRef, message_id: &str) -> Result<ChatMessage>;

    /// The message a thread was opened from, when the platform has one.
    fn thread_starter(&self, _thread: &ChannelRef) -> Result<Option<ChatMessage>> {
        Ok(None)
    }
}

pub trait AttachmentDownloader {
    fn download(&self, attachment: &AttachmentRef, destination: &Path) -> Result<()>;
}
