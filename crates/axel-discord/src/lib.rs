use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axel_capture::{
    AttachmentDownloader, AttachmentRef, ChannelRef, ChatHistory, ChatMessage, ThreadParent,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

mod wire;

pub use wire::{
    DiscordAttachment, DiscordBotIdentity, DiscordChannel, DiscordMember, DiscordMessage,
    DiscordMessageRef, DiscordMessageReference, DiscordUser,
};

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const MAX_PAGE_SIZE: usize = 100;

/// Blocking Discord REST client used for capture, polling and replies.
#[derive(Debug, Clone)]
pub struct DiscordGateway {
    client: Client,
    /// Attachment CDN URLs are fetched without the bot token.
    downloads: Client,
    base_url: String,
}

impl DiscordGateway {
    pub fn new(token: &str, timeout_ms: u64) -> Result<Self> {
        Self::with_base_url(token, timeout_ms, DISCORD_API_BASE)
    }

    pub fn with_base_url(token: &str, timeout_ms: u64, base_url: &str) -> Result<Self> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            bail!("discord token is empty; set DISCORD_BOT_TOKEN");
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bot {trimmed}"))
                .with_context(|| "failed to build discord authorization header")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let timeout = Duration::from_millis(timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .with_context(|| "failed to build discord HTTP client")?;
        let downloads = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build attachment HTTP client")?;

        Ok(Self {
            client,
            downloads,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn healthcheck(&self) -> Result<DiscordBotIdentity> {
        self.get_json("/users/@me", &[], "healthcheck")
    }

    pub fn send_message(&self, channel_id: &str, content: &str) -> Result<DiscordMessageRef> {
        let channel_id = required(channel_id, "channel_id")?;
        if content.trim().is_empty() {
            bail!("content is required");
        }

        let response = self
            .client
            .post(self.url(&format!("/channels/{channel_id}/messages")))
            .json(&serde_json::json!({
                "content": content,
                "allowed_mentions": { "parse": [] }
            }))
            .send()
            .with_context(|| "failed to send discord message")?;
        let response = ensure_success(response, "send")?;
        response
            .json::<DiscordMessageRef>()
            .with_context(|| "failed to parse discord message response")
    }

    /// Messages newer than `after_message_id`, oldest first.
    pub fn list_recent_messages(
        &self,
        channel_id: &str,
        after_message_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DiscordMessage>> {
        let channel_id = required(channel_id, "channel_id")?;
        let mut query = vec![("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string())];
        if let Some(after) = after_message_id
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            query.push(("after", after.to_string()));
        }
        let mut messages: Vec<DiscordMessage> = self.get_json(
            &format!("/channels/{channel_id}/messages"),
            &query,
            "list messages",
        )?;
        messages.sort_by_key(|msg| msg.id.parse::<u64>().unwrap_or_default());
        Ok(messages)
    }

    /// Channel metadata, with the parent's name filled in for threads.
    pub fn fetch_channel(&self, channel_id: &str) -> Result<ChannelRef> {
        let channel_id = required(channel_id, "channel_id")?;
        let channel: DiscordChannel =
            self.get_json(&format!("/channels/{channel_id}"), &[], "fetch channel")?;

        let thread_parent = match (&channel.parent_id, channel.is_thread()) {
            (Some(parent_id), true) => {
                let name = match self.get_json::<DiscordChannel>(
                    &format!("/channels/{parent_id}"),
                    &[],
                    "fetch channel",
                ) {
                    Ok(parent) => parent.name,
                    Err(err) => {
                        warn!(parent_id = %parent_id, error = %err, "thread parent lookup failed");
                        None
                    }
                };
                Some(ThreadParent {
                    id: parent_id.clone(),
                    name,
                })
            }
            _ => None,
        };

        Ok(ChannelRef {
            id: channel.id,
            name: channel.name,
            guild_id: channel.guild_id,
            thread_parent,
        })
    }

    pub fn list_messages_before(
        &self,
        channel_id: &str,
        before_message_id: &str,
        limit: usize,
    ) -> Result<Vec<DiscordMessage>> {
        let channel_id = required(channel_id, "channel_id")?;
        let before = required(before_message_id, "before_message_id")?;
        self.get_json(
            &format!("/channels/{channel_id}/messages"),
            &[
                ("before", before.to_string()),
                ("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string()),
            ],
            "list messages",
        )
    }

    /// `None` when Discord reports the message as unknown.
    pub fn fetch_message_opt(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<DiscordMessage>> {
        let channel_id = required(channel_id, "channel_id")?;
        let message_id = required(message_id, "message_id")?;
        let response = self
            .client
            .get(self.url(&format!("/channels/{channel_id}/messages/{message_id}")))
            .send()
            .with_context(|| "failed to call discord fetch message")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, "fetch message")?;
        let message = response
            .json::<DiscordMessage>()
            .with_context(|| "failed to parse discord message")?;
        Ok(Some(message))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        action: &str,
    ) -> Result<T> {
        let mut request: RequestBuilder = self.client.get(self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request
            .send()
            .with_context(|| format!("failed to call discord {action}"))?;
        let response = ensure_success(response, action)?;
        response
            .json::<T>()
            .with_context(|| format!("failed to parse discord {action} response"))
    }
}

impl ChatHistory for DiscordGateway {
    fn history_before(
        &self,
        channel: &ChannelRef,
        before: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let page = self.list_messages_before(&channel.id, before, limit)?;
        debug!(channel_id = %channel.id, count = page.len(), "fetched history page");
        Ok(page
            .into_iter()
            .filter_map(|message| {
                let id = message.id.clone();
                match message.into_chat_message(channel) {
                    Ok(message) => Some(message),
                    Err(err) => {
                        warn!(message_id = %id, error = %err, "skipping unreadable history message");
                        None
                    }
                }
            })
            .collect())
    }

    fn fetch_message(&self, channel: &ChannelRef, message_id: &str) -> Result<ChatMessage> {
        match self.fetch_message_opt(&channel.id, message_id)? {
            Some(message) => message.into_chat_message(channel),
            None => bail!("discord fetch message failed: 404 Unknown Message {message_id}"),
        }
    }

    /// Text-channel threads share their id with the message they were opened
    /// from in the parent channel; forum posts keep it inside the thread.
    fn thread_starter(&self, thread: &ChannelRef) -> Result<Option<ChatMessage>> {
        let Some(parent) = &thread.thread_parent else {
            return Ok(None);
        };
        let parent_channel = ChannelRef {
            id: parent.id.clone(),
            name: parent.name.clone(),
            guild_id: thread.guild_id.clone(),
            thread_parent: None,
        };
        if let Some(message) = self.fetch_message_opt(&parent.id, &thread.id)? {
            return message.into_chat_message(&parent_channel).map(Some);
        }
        match self.fetch_message_opt(&thread.id, &thread.id)? {
            Some(message) => message.into_chat_message(thread).map(Some),
            None => Ok(None),
        }
    }
}

impl AttachmentDownloader for DiscordGateway {
    fn download(&self, attachment: &AttachmentRef, destination: &Path) -> Result<()> {
        let response = self
            .downloads
            .get(&attachment.url)
            .send()
            .with_context(|| format!("failed to download {}", attachment.filename))?;
        let response = ensure_success(response, "attachment download")?;
        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read {}", attachment.filename))?;
        fs::write(destination, &bytes)
            .with_context(|| format!("failed to write {}", destination.display()))?;
        Ok(())
    }
}

fn required<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{name} is required");
    }
    Ok(trimmed)
}

fn ensure_success(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    bail!("discord {action} failed: {} {}", status.as_u16(), body);
}
