use std::sync::Arc;

use crate::domain::{CallbackQuery, ChatId, Message, MessageReaction};

/// Event names a source can be subscribed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    EditedMessage,
    ChannelPost,
    MessageReaction,
    CallbackQuery,
}

/// Cross-messenger incoming update.
///
/// Payloads are shared so that every subscriber (and every collector that
/// keeps the value) sees the same allocation.
#[derive(Clone, Debug)]
pub enum UpdateEvent {
    Message(Arc<Message>),
    EditedMessage(Arc<Message>),
    ChannelPost(Arc<Message>),
    MessageReaction(Arc<MessageReaction>),
    CallbackQuery(Arc<CallbackQuery>),
}

impl UpdateEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::EditedMessage(_) => EventKind::EditedMessage,
            Self::ChannelPost(_) => EventKind::ChannelPost,
            Self::MessageReaction(_) => EventKind::MessageReaction,
            Self::CallbackQuery(_) => EventKind::CallbackQuery,
        }
    }

    /// Originating chat, when the update carries one.
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Message(m) | Self::EditedMessage(m) | Self::ChannelPost(m) => Some(m.chat.id),
            Self::MessageReaction(r) => Some(r.chat.id),
            Self::CallbackQuery(q) => q.chat_id(),
        }
    }
}
