//! teloxide -> `tgs-core` record conversion.
//!
//! teloxide 0.12 predates reaction updates, so `UpdateEvent::MessageReaction`
//! is never produced here; other sources can still dispatch it.

use std::sync::Arc;

use teloxide::types as tg;

use tgs_core::{
    domain::{
        CallbackQuery, CallbackQueryId, Chat, ChatId, ChatKind, Message, MessageId, User, UserId,
    },
    updates::types::UpdateEvent,
};

pub fn chat(c: &tg::Chat) -> Chat {
    let kind = if c.is_private() {
        ChatKind::Private
    } else if c.is_channel() {
        ChatKind::Channel
    } else if c.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Group
    };

    Chat {
        id: ChatId(c.id.0),
        kind,
        title: c.title().map(str::to_string),
        username: c.username().map(str::to_string),
    }
}

pub fn user(u: &tg::User) -> User {
    User {
        id: UserId(u.id.0 as i64),
        is_bot: u.is_bot,
        first_name: u.first_name.clone(),
        last_name: u.last_name.clone(),
        username: u.username.clone(),
    }
}

pub fn message(m: &tg::Message) -> Message {
    Message {
        id: MessageId(m.id.0),
        chat: chat(&m.chat),
        from: m.from().map(user),
        date: m.date,
        text: m.text().map(str::to_string),
        caption: m.caption().map(str::to_string),
    }
}

pub fn callback_query(q: &tg::CallbackQuery) -> CallbackQuery {
    CallbackQuery {
        id: CallbackQueryId(q.id.clone()),
        from: user(&q.from),
        message: q.message.as_ref().map(message),
        inline_message_id: q.inline_message_id.clone(),
        chat_instance: q.chat_instance.clone(),
        data: q.data.clone(),
    }
}

/// `None` for update kinds no collector consumes.
pub fn update(u: &tg::Update) -> Option<UpdateEvent> {
    match &u.kind {
        tg::UpdateKind::Message(m) => Some(UpdateEvent::Message(Arc::new(message(m)))),
        tg::UpdateKind::EditedMessage(m) => {
            Some(UpdateEvent::EditedMessage(Arc::new(message(m))))
        }
        tg::UpdateKind::ChannelPost(m) => Some(UpdateEvent::ChannelPost(Arc::new(message(m)))),
        tg::UpdateKind::CallbackQuery(q) => {
            Some(UpdateEvent::CallbackQuery(Arc::new(callback_query(q))))
        }
        _ => None,
    }
}
