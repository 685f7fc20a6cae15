use std::sync::Arc;

use crate::{
    collection::Collection,
    collector::{await_end, AwaitOptions, Collector, CollectorOptions, Matcher},
    domain::{CallbackQuery, CallbackQueryId, ChatId, MessageId},
    errors::Error,
    updates::{
        port::UpdateSource,
        types::{EventKind, UpdateEvent},
    },
    Result,
};

/// Accepts button presses on keyboards attached to messages in one chat,
/// optionally on a single message.
#[derive(Clone, Debug)]
pub struct InlineKeyboardMatcher {
    chat_id: ChatId,
    message_id: Option<MessageId>,
}

impl InlineKeyboardMatcher {
    pub fn new(chat_id: ChatId, message_id: Option<MessageId>) -> Result<Self> {
        if chat_id.0 == 0 {
            return Err(Error::Construction(
                "inline keyboard collector requires a chat id".to_string(),
            ));
        }
        Ok(Self {
            chat_id,
            message_id,
        })
    }
}

impl Matcher for InlineKeyboardMatcher {
    type Key = CallbackQueryId;
    type Value = Arc<CallbackQuery>;

    fn kinds(&self) -> &'static [EventKind] {
        &[EventKind::CallbackQuery]
    }

    fn extract(&self, event: &UpdateEvent) -> Option<(CallbackQueryId, Arc<CallbackQuery>)> {
        let UpdateEvent::CallbackQuery(q) = event else {
            return None;
        };
        // Inline-mode queries carry no message and so no chat to scope by.
        let message = q.message.as_ref()?;
        if message.chat.id != self.chat_id {
            return None;
        }
        if self.message_id.is_some_and(|id| id != message.id) {
            return None;
        }
        Some((q.id.clone(), q.clone()))
    }
}

pub type InlineKeyboardCollector = Collector<InlineKeyboardMatcher>;

impl InlineKeyboardCollector {
    pub fn new(
        source: &dyn UpdateSource,
        chat_id: ChatId,
        options: CollectorOptions<InlineKeyboardMatcher>,
    ) -> Result<Self> {
        Collector::attach(source, InlineKeyboardMatcher::new(chat_id, None)?, options)
    }

    /// Presses on the keyboard of one message.
    pub fn for_message(
        source: &dyn UpdateSource,
        chat_id: ChatId,
        message_id: MessageId,
        options: CollectorOptions<InlineKeyboardMatcher>,
    ) -> Result<Self> {
        Collector::attach(
            source,
            InlineKeyboardMatcher::new(chat_id, Some(message_id))?,
            options,
        )
    }
}

pub async fn await_callback_queries(
    source: &dyn UpdateSource,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    options: AwaitOptions<InlineKeyboardMatcher>,
) -> Result<Collection<CallbackQueryId, Arc<CallbackQuery>>> {
    let matcher = InlineKeyboardMatcher::new(chat_id, message_id)?;
    let end = await_end(source, matcher, options).await?;
    Ok(end.collected)
}

/// Wait for the first accepted button press; rejects when none arrived.
pub async fn await_callback_query(
    source: &dyn UpdateSource,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    mut options: AwaitOptions<InlineKeyboardMatcher>,
) -> Result<Arc<CallbackQuery>> {
    options.collector.max = Some(1);
    let matcher = InlineKeyboardMatcher::new(chat_id, message_id)?;
    let end = await_end(source, matcher, options).await?;
    end.collected
        .first()
        .cloned()
        .ok_or(Error::CollectorEnded { reason: end.reason })
}
