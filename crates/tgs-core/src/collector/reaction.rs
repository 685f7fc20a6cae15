use std::sync::Arc;

use crate::{
    collection::Collection,
    collector::{await_end, AwaitOptions, Collector, CollectorOptions, Matcher},
    domain::{ChatId, MessageId, MessageReaction, ReactionId},
    errors::Error,
    updates::{
        port::UpdateSource,
        types::{EventKind, UpdateEvent},
    },
    Result,
};

/// Accepts reaction changes in one chat, optionally on a single message.
#[derive(Clone, Debug)]
pub struct ReactionMatcher {
    chat_id: ChatId,
    message_id: Option<MessageId>,
}

impl ReactionMatcher {
    pub fn new(chat_id: ChatId, message_id: Option<MessageId>) -> Result<Self> {
        if chat_id.0 == 0 {
            return Err(Error::Construction(
                "reaction collector requires a chat id".to_string(),
            ));
        }
        Ok(Self {
            chat_id,
            message_id,
        })
    }
}

impl Matcher for ReactionMatcher {
    type Key = ReactionId;
    type Value = Arc<MessageReaction>;

    fn kinds(&self) -> &'static [EventKind] {
        &[EventKind::MessageReaction]
    }

    fn extract(&self, event: &UpdateEvent) -> Option<(ReactionId, Arc<MessageReaction>)> {
        let UpdateEvent::MessageReaction(r) = event else {
            return None;
        };
        if r.chat.id != self.chat_id {
            return None;
        }
        if self.message_id.is_some_and(|id| id != r.message_id) {
            return None;
        }
        // Anonymous updates without an actor cannot be keyed.
        Some((r.id()?, r.clone()))
    }
}

pub type ReactionCollector = Collector<ReactionMatcher>;

impl ReactionCollector {
    /// Reactions on any message in `chat_id`.
    pub fn new(
        source: &dyn UpdateSource,
        chat_id: ChatId,
        options: CollectorOptions<ReactionMatcher>,
    ) -> Result<Self> {
        Collector::attach(source, ReactionMatcher::new(chat_id, None)?, options)
    }

    /// Reactions on one message.
    pub fn for_message(
        source: &dyn UpdateSource,
        chat_id: ChatId,
        message_id: MessageId,
        options: CollectorOptions<ReactionMatcher>,
    ) -> Result<Self> {
        Collector::attach(
            source,
            ReactionMatcher::new(chat_id, Some(message_id))?,
            options,
        )
    }
}

pub async fn await_reactions(
    source: &dyn UpdateSource,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    options: AwaitOptions<ReactionMatcher>,
) -> Result<Collection<ReactionId, Arc<MessageReaction>>> {
    let end = await_end(source, ReactionMatcher::new(chat_id, message_id)?, options).await?;
    Ok(end.collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Chat, ReactionActor, ReactionType, User, UserId},
        updates::bus::UpdateBus,
    };
    use chrono::{TimeZone, Utc};

    fn reaction(message: i32, user: Option<i64>, at: i64, emoji: &str) -> UpdateEvent {
        numbered_reaction(message, user, at, emoji, None)
    }

    fn numbered_reaction(
        message: i32,
        user: Option<i64>,
        at: i64,
        emoji: &str,
        update_id: Option<i64>,
    ) -> UpdateEvent {
        UpdateEvent::MessageReaction(Arc::new(MessageReaction {
            chat: Chat::private(ChatId(5)),
            message_id: MessageId(message),
            user: user.map(|id| User {
                id: UserId(id),
                is_bot: false,
                first_name: "u".to_string(),
                last_name: None,
                username: None,
            }),
            actor_chat: None,
            date: Utc.timestamp_opt(at, 0).unwrap(),
            old_reaction: vec![],
            new_reaction: vec![ReactionType::Emoji(emoji.to_string())],
            update_id,
        }))
    }

    #[tokio::test]
    async fn scoped_to_one_message() {
        let bus = UpdateBus::new();
        let c = ReactionCollector::for_message(
            &bus,
            ChatId(5),
            MessageId(42),
            CollectorOptions::new().no_time(),
        )
        .unwrap();

        bus.dispatch(&reaction(42, Some(1), 100, "👍"));
        bus.dispatch(&reaction(43, Some(1), 101, "👍"));
        bus.dispatch(&reaction(42, None, 102, "🔥"));

        let got = c.snapshot();
        assert_eq!(got.len(), 1);
        let key = got.first_key().unwrap();
        assert_eq!(key.actor, ReactionActor::User(UserId(1)));
        assert_eq!(key.to_string(), "5:42:u1:100");
    }

    #[tokio::test]
    async fn same_change_is_upserted() {
        let bus = UpdateBus::new();
        let c = ReactionCollector::new(&bus, ChatId(5), CollectorOptions::new().no_time().max(2))
            .unwrap();

        bus.dispatch(&reaction(1, Some(1), 100, "👍"));
        bus.dispatch(&reaction(1, Some(1), 100, "❤"));
        assert_eq!(c.count(), 1);
        assert!(c.is_running());

        bus.dispatch(&reaction(1, Some(2), 100, "👍"));
        assert!(!c.is_running());
    }

    #[tokio::test]
    async fn update_ids_separate_changes_within_one_second() {
        let bus = UpdateBus::new();
        let c = ReactionCollector::new(&bus, ChatId(5), CollectorOptions::new().no_time())
            .unwrap();

        bus.dispatch(&numbered_reaction(1, Some(1), 100, "👍", Some(7)));
        bus.dispatch(&numbered_reaction(1, Some(1), 100, "❤", Some(8)));
        assert_eq!(c.count(), 2);

        let keys: Vec<String> = c.snapshot().keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["5:1:u1:100#7", "5:1:u1:100#8"]);
    }
}
