use anyhow::{Context, Result};
use axel_capture::{AttachmentRef, Author, ChannelRef, ChatMessage, MessageReference};
use chrono::DateTime;
use serde::Deserialize;

const THREAD_CHANNEL_TYPES: [u8; 3] = [10, 11, 12];

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordBotIdentity {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessageRef {
    pub id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordMember {
    #[serde(default)]
    pub nick: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordAttachment {
    pub id: String,
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessageReference {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub content: String,
    pub author: DiscordUser,
    #[serde(default)]
    pub member: Option<DiscordMember>,
    pub timestamp: String,
    #[serde(default)]
    pub attachments: Vec<DiscordAttachment>,
    #[serde(default)]
    pub mentions: Vec<DiscordUser>,
    #[serde(default)]
    pub message_reference: Option<DiscordMessageReference>,
}

impl DiscordMessage {
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|user| user.id == user_id)
    }

    /// Converts into the platform-neutral message, posted in `channel`.
    pub fn into_chat_message(self, channel: &ChannelRef) -> Result<ChatMessage> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .with_context(|| format!("invalid timestamp on discord message {}", self.id))?;
        let guild = channel
            .guild_id
            .as_deref()
            .or(self.guild_id.as_deref())
            .unwrap_or("@me");
        let link = format!(
            "https://discord.com/channels/{guild}/{}/{}",
            self.channel_id, self.id
        );
        let reference = self.message_reference.and_then(|reference| {
            Some(MessageReference {
                message_id: reference.message_id?,
                channel_id: reference.channel_id,
            })
        });

        Ok(ChatMessage {
            id: self.id,
            channel: channel.clone(),
            author: Author {
                display_name: self.member.and_then(|member| member.nick),
                global_name: self.author.global_name,
                username: Some(self.author.username),
            },
            timestamp,
            link,
            content: self.content,
            attachments: self
                .attachments
                .into_iter()
                .map(|attachment| AttachmentRef {
                    filename: attachment.filename,
                    url: attachment.url,
                })
                .collect(),
            reference,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl DiscordChannel {
    pub fn is_thread(&self) -> bool {
        THREAD_CHANNEL_TYPES.contains(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(json: serde_json::Value) -> DiscordMessage {
        serde_json::from_value(json).expect("message json")
    }

    #[test]
    fn converts_nick_link_and_reference() {
        let channel = ChannelRef {
            id: "100".to_string(),
            name: Some("axel".to_string()),
            guild_id: Some("1".to_string()),
            thread_parent: None,
        };
        let converted = message(serde_json::json!({
            "id": "42",
            "channel_id": "100",
            "content": "hi",
            "author": {"id": "7", "username": "alice", "global_name": "Alice A"},
            "member": {"nick": "ally"},
            "timestamp": "2024-05-01T12:00:00.000000+00:00",
            "message_reference": {"message_id": "41", "channel_id": "100"}
        }))
        .into_chat_message(&channel)
        .expect("convert");

        assert_eq!(converted.author.heading_name(), "ally");
        assert_eq!(converted.link, "https://discord.com/channels/1/100/42");
        assert_eq!(
            converted.reference.map(|reference| reference.message_id),
            Some("41".to_string())
        );
    }

    #[test]
    fn direct_messages_link_through_me() {
        let converted = message(serde_json::json!({
            "id": "5",
            "channel_id": "9",
            "author": {"id": "7", "username": "alice"},
            "timestamp": "2024-05-01T12:00:00+00:00",
            "message_reference": {"channel_id": "9"}
        }))
        .into_chat_message(&ChannelRef {
            id: "9".to_string(),
            ..ChannelRef::default()
        })
        .expect("convert");

        assert_eq!(converted.link, "https://discord.com/channels/@me/9/5");
        assert!(converted.reference.is_none());
        assert_eq!(converted.content, "");
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let result = message(serde_json::json!({
            "id": "5",
            "channel_id": "9",
            "author": {"id": "7", "username": "alice"},
            "timestamp": "yesterday"
        }))
        .into_chat_message(&ChannelRef::default());
        assert!(result.is_err());
    }
}
