use std::sync::Arc;

use crate::{
    collection::Collection,
    collector::{await_end, AwaitOptions, Collector, CollectorOptions, Matcher},
    domain::{ChatId, Message, MessageId},
    errors::Error,
    updates::{
        port::UpdateSource,
        types::{EventKind, UpdateEvent},
    },
    Result,
};

/// Accepts new messages (and channel posts) from one chat, keyed by message id.
#[derive(Clone, Debug)]
pub struct MessageMatcher {
    chat_id: ChatId,
}

impl MessageMatcher {
    pub fn new(chat_id: ChatId) -> Result<Self> {
        if chat_id.0 == 0 {
            return Err(Error::Construction(
                "message collector requires a chat id".to_string(),
            ));
        }
        Ok(Self { chat_id })
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

impl Matcher for MessageMatcher {
    type Key = MessageId;
    type Value = Arc<Message>;

    fn kinds(&self) -> &'static [EventKind] {
        &[EventKind::Message, EventKind::ChannelPost]
    }

    fn extract(&self, event: &UpdateEvent) -> Option<(MessageId, Arc<Message>)> {
        match event {
            UpdateEvent::Message(m) | UpdateEvent::ChannelPost(m) if m.chat.id == self.chat_id => {
                Some((m.id, m.clone()))
            }
            _ => None,
        }
    }
}

pub type MessageCollector = Collector<MessageMatcher>;

impl MessageCollector {
    pub fn new(
        source: &dyn UpdateSource,
        chat_id: ChatId,
        options: CollectorOptions<MessageMatcher>,
    ) -> Result<Self> {
        Collector::attach(source, MessageMatcher::new(chat_id)?, options)
    }

    pub fn chat_id(&self) -> ChatId {
        self.inner.matcher.chat_id()
    }
}

/// Collect messages from `chat_id` until the collector ends.
pub async fn await_messages(
    source: &dyn UpdateSource,
    chat_id: ChatId,
    options: AwaitOptions<MessageMatcher>,
) -> Result<Collection<MessageId, Arc<Message>>> {
    let end = await_end(source, MessageMatcher::new(chat_id)?, options).await?;
    Ok(end.collected)
}

/// Wait for the first accepted message; rejects when none arrived.
pub async fn await_message(
    source: &dyn UpdateSource,
    chat_id: ChatId,
    mut options: AwaitOptions<MessageMatcher>,
) -> Result<Arc<Message>> {
    options.collector.max = Some(1);
    let end = await_end(source, MessageMatcher::new(chat_id)?, options).await?;
    end.collected
        .first()
        .cloned()
        .ok_or(Error::CollectorEnded { reason: end.reason })
}
