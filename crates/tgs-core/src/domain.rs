//! Minimal domain records consumed by the collectors.
//!
//! Only the fields the matchers and filters need are modeled; full Bot API
//! field mapping is left to adapter crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric, unique within a chat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i32);

/// Callback query id (opaque string assigned by Telegram).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallbackQueryId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CallbackQueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat type discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl Chat {
    pub fn private(id: ChatId) -> Self {
        Self {
            id,
            kind: ChatKind::Private,
            title: None,
            username: None,
        }
    }

    pub fn is_private(&self) -> bool {
        self.kind == ChatKind::Private
    }

    /// Groups and supergroups.
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ChatKind::Group | ChatKind::Supergroup)
    }

    pub fn is_channel(&self) -> bool {
        self.kind == ChatKind::Channel
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat: Chat,
    pub from: Option<User>,
    pub date: DateTime<Utc>,
    pub text: Option<String>,
    pub caption: Option<String>,
}

impl Message {
    /// Text body, falling back to the media caption.
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    pub fn sender_id(&self) -> Option<UserId> {
        self.from.as_ref().map(|u| u.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ReactionType {
    Emoji(String),
    CustomEmoji(String),
}

/// Who changed a reaction: a user, or a chat acting anonymously.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReactionActor {
    User(UserId),
    Chat(ChatId),
}

/// Identity of a single reaction change.
///
/// Keyed by the message, the actor, the second it happened and the update id
/// when the source supplies one. Without an update id, two changes by the same
/// actor within one second share a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReactionId {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub actor: ReactionActor,
    pub date: i64,
    pub update_id: Option<i64>,
}

impl fmt::Display for ReactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actor = match self.actor {
            ReactionActor::User(u) => format!("u{u}"),
            ReactionActor::Chat(c) => format!("c{c}"),
        };
        write!(
            f,
            "{}:{}:{}:{}",
            self.chat_id, self.message_id, actor, self.date
        )?;
        if let Some(update_id) = self.update_id {
            write!(f, "#{update_id}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageReaction {
    pub chat: Chat,
    pub message_id: MessageId,
    pub user: Option<User>,
    pub actor_chat: Option<Chat>,
    pub date: DateTime<Utc>,
    pub old_reaction: Vec<ReactionType>,
    pub new_reaction: Vec<ReactionType>,
    /// Update id assigned by the source, unique per change.
    #[serde(default)]
    pub update_id: Option<i64>,
}

impl MessageReaction {
    /// `None` when the update carries neither a user nor an actor chat.
    pub fn actor(&self) -> Option<ReactionActor> {
        if let Some(user) = &self.user {
            return Some(ReactionActor::User(user.id));
        }
        self.actor_chat
            .as_ref()
            .map(|c| ReactionActor::Chat(c.id))
    }

    pub fn id(&self) -> Option<ReactionId> {
        Some(ReactionId {
            chat_id: self.chat.id,
            message_id: self.message_id,
            actor: self.actor()?,
            date: self.date.timestamp(),
            update_id: self.update_id,
        })
    }

    /// Reactions present after the change that were not there before.
    pub fn added(&self) -> Vec<&ReactionType> {
        self.new_reaction
            .iter()
            .filter(|r| !self.old_reaction.contains(r))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: CallbackQueryId,
    pub from: User,
    pub message: Option<Message>,
    pub inline_message_id: Option<String>,
    pub chat_instance: String,
    pub data: Option<String>,
}

impl CallbackQuery {
    /// Chat of the message carrying the pressed keyboard, if still accessible.
    pub fn chat_id(&self) -> Option<ChatId> {
        self.message.as_ref().map(|m| m.chat.id)
    }
}
