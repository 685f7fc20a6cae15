//! `/collect` and `/vote`: small commands driven by collectors.

use std::{sync::Arc, time::Duration};

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
};

use tgs_core::{
    collector::{
        await_messages, CollectorOptions, InlineKeyboardCollector, InlineKeyboardMatcher,
        MessageMatcher,
    },
    config::Config,
    domain::{CallbackQuery, CallbackQueryId, ChatId, Message, MessageId, UserId},
    updates::{
        bus::UpdateBus,
        port::{Subscription, UpdateSource},
        types::{EventKind, UpdateEvent},
    },
    Collection,
};

const VOTE_WINDOW: Duration = Duration::from_secs(30);
const VOTE_OPTIONS: &[(&str, &str)] = &[("👍 Yes", "vote:yes"), ("👎 No", "vote:no")];
const PREVIEW_LINES: usize = 3;

/// Serve commands from incoming messages and answer every vote button press.
///
/// Presses are answered here, including late ones and those the vote filter
/// rejects.
pub fn install(bus: &UpdateBus, bot: Bot, cfg: Arc<Config>) -> Subscription {
    let source = bus.clone();
    bus.subscribe(
        &[EventKind::Message, EventKind::CallbackQuery],
        Arc::new(move |event: &UpdateEvent| match event {
            UpdateEvent::Message(msg) => on_message(msg, &bot, &source, &cfg),
            UpdateEvent::CallbackQuery(q) => {
                if let Some(id) = vote_press(q) {
                    let bot = bot.clone();
                    let id = id.0.clone();
                    tokio::spawn(async move {
                        if let Err(e) = bot.answer_callback_query(id).await {
                            tracing::debug!(error = %e, "answering vote press failed");
                        }
                    });
                }
            }
            _ => {}
        }),
    )
}

fn on_message(msg: &Message, bot: &Bot, bus: &UpdateBus, cfg: &Config) {
    let Some((name, args)) = parse_command(msg) else {
        return;
    };

    let bot = bot.clone();
    let bus = bus.clone();
    let chat_id = msg.chat.id;
    match name {
        "collect" => {
            let options = cfg.collector_defaults::<MessageMatcher>();
            tokio::spawn(async move {
                if let Err(e) = collect(bot, bus, chat_id, options).await {
                    tracing::warn!(%chat_id, error = %e, "/collect failed");
                }
            });
        }
        "vote" => {
            let question = if args.is_empty() {
                "Vote!".to_string()
            } else {
                args.to_string()
            };
            tokio::spawn(async move {
                if let Err(e) = vote(bot, bus, chat_id, question).await {
                    tracing::warn!(%chat_id, error = %e, "/vote failed");
                }
            });
        }
        _ => {}
    }
}

/// The query id of a press on a vote keyboard.
fn vote_press(q: &CallbackQuery) -> Option<&CallbackQueryId> {
    q.data
        .as_deref()
        .is_some_and(|d| d.starts_with("vote:"))
        .then_some(&q.id)
}

fn is_vote_option(data: &str) -> bool {
    VOTE_OPTIONS.iter().any(|(_, opt)| *opt == data)
}

/// `/name@bot args` -> `(name, args)`.
fn parse_command(msg: &Message) -> Option<(&str, &str)> {
    let text = msg.text.as_deref()?.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name, args.trim()))
}

fn is_command(msg: &Message) -> bool {
    parse_command(msg).is_some()
}

async fn collect(
    bot: Bot,
    bus: UpdateBus,
    chat_id: ChatId,
    options: CollectorOptions<MessageMatcher>,
) -> anyhow::Result<()> {
    let tg_chat = teloxide::types::ChatId(chat_id.0);
    let window = options
        .time
        .map(|t| format!(" for {}s", t.as_secs()))
        .unwrap_or_default();
    bot.send_message(tg_chat, format!("Collecting messages{window}..."))
        .await?;

    let options = options.filter(|m, _, _| !is_command(m));
    let collected = await_messages(&bus, chat_id, options.into()).await?;

    bot.send_message(tg_chat, summarize(&collected)).await?;
    Ok(())
}

fn summarize(collected: &Collection<MessageId, Arc<Message>>) -> String {
    if collected.is_empty() {
        return "Nothing collected.".to_string();
    }

    let (with_text, other) = collected.partition(|m, _, _| m.content().is_some());
    let senders: Collection<UserId, ()> = collected
        .values()
        .filter_map(|m| m.sender_id())
        .map(|id| (id, ()))
        .collect();

    let mut out = format!(
        "Collected {} message(s) from {} sender(s): {} with text, {} other.",
        collected.len(),
        senders.len(),
        with_text.values.len(),
        other.values.len()
    );
    for m in with_text.values.iter().take(PREVIEW_LINES) {
        out.push_str("\n- ");
        out.push_str(m.content().unwrap_or_default());
    }
    out
}

async fn vote(bot: Bot, bus: UpdateBus, chat_id: ChatId, question: String) -> anyhow::Result<()> {
    let tg_chat = teloxide::types::ChatId(chat_id.0);
    let buttons: Vec<InlineKeyboardButton> = VOTE_OPTIONS
        .iter()
        .map(|(label, data)| InlineKeyboardButton::callback(*label, *data))
        .collect();
    let sent = bot
        .send_message(tg_chat, question)
        .reply_markup(InlineKeyboardMarkup::new(vec![buttons]))
        .await?;

    let collector = InlineKeyboardCollector::for_message(
        &bus,
        chat_id,
        MessageId(sent.id.0),
        CollectorOptions::<InlineKeyboardMatcher>::new()
            .time(VOTE_WINDOW)
            .filter(|q, _, _| q.data.as_deref().is_some_and(is_vote_option)),
    )?;
    let end = collector.ended().await;

    bot.send_message(tg_chat, tally(&end.collected)).await?;
    Ok(())
}

/// Each voter's last press counts.
fn tally(collected: &Collection<CallbackQueryId, Arc<CallbackQuery>>) -> String {
    let votes: Collection<UserId, String> = collected
        .values()
        .filter_map(|q| Some((q.from.id, q.data.clone()?)))
        .collect();
    if votes.is_empty() {
        return "No votes.".to_string();
    }

    let lines = VOTE_OPTIONS
        .iter()
        .map(|(label, data)| {
            let n = votes.filter(|v, _, _| v.as_str() == *data).len();
            format!("{label}: {n}")
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{} voter(s)\n{lines}", votes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgs_core::domain::{Chat, User};

    fn user(id: i64) -> User {
        User {
            id: UserId(id),
            is_bot: false,
            first_name: "u".to_string(),
            last_name: None,
            username: None,
        }
    }

    fn text_message(id: i32, from: i64, text: Option<&str>) -> Arc<Message> {
        Arc::new(Message {
            id: MessageId(id),
            chat: Chat::private(ChatId(1)),
            from: Some(user(from)),
            date: chrono::Utc::now(),
            text: text.map(str::to_string),
            caption: None,
        })
    }

    #[test]
    fn parses_commands() {
        let m = text_message(1, 1, Some("/vote@my_bot Lunch at noon?"));
        assert_eq!(parse_command(&m), Some(("vote", "Lunch at noon?")));

        let m = text_message(1, 1, Some("/collect"));
        assert_eq!(parse_command(&m), Some(("collect", "")));

        assert!(!is_command(&text_message(1, 1, Some("hello /collect"))));
        assert!(!is_command(&text_message(1, 1, Some("/"))));
        assert!(!is_command(&text_message(1, 1, None)));
    }

    #[test]
    fn summarizes_collected_messages() {
        let collected: Collection<MessageId, Arc<Message>> = [
            text_message(1, 10, Some("first")),
            text_message(2, 11, None),
            text_message(3, 10, Some("second")),
        ]
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

        let s = summarize(&collected);
        assert!(s.starts_with("Collected 3 message(s) from 2 sender(s): 2 with text, 1 other."));
        assert!(s.contains("- first\n- second"));
        assert_eq!(summarize(&Collection::new()), "Nothing collected.");
    }

    fn callback(id: &str, from: i64, data: Option<&str>) -> Arc<CallbackQuery> {
        Arc::new(CallbackQuery {
            id: CallbackQueryId(id.to_string()),
            from: user(from),
            message: None,
            inline_message_id: None,
            chat_instance: "ci".to_string(),
            data: data.map(str::to_string),
        })
    }

    #[test]
    fn every_vote_press_is_answered() {
        let yes = callback("a", 1, Some("vote:yes"));
        assert_eq!(vote_press(&yes), Some(&CallbackQueryId("a".to_string())));

        // Unknown vote options are rejected by the collector but still answered.
        let stale = callback("b", 1, Some("vote:maybe"));
        assert_eq!(vote_press(&stale), Some(&CallbackQueryId("b".to_string())));
        assert!(!is_vote_option("vote:maybe"));
        assert!(is_vote_option("vote:no"));

        assert_eq!(vote_press(&callback("c", 1, Some("other"))), None);
        assert_eq!(vote_press(&callback("d", 1, None)), None);
    }

    #[test]
    fn tally_counts_last_press_per_user() {
        let press = |id: &str, from: i64, data: &str| {
            let q = callback(id, from, Some(data));
            (q.id.clone(), q)
        };
        let collected: Collection<CallbackQueryId, Arc<CallbackQuery>> = [
            press("a", 1, "vote:yes"),
            press("b", 2, "vote:yes"),
            press("c", 1, "vote:no"),
        ]
        .into_iter()
        .collect();

        assert_eq!(tally(&collected), "2 voter(s)\n👍 Yes: 1\n👎 No: 1");
        assert_eq!(tally(&Collection::new()), "No votes.");
    }
}
