//! Bounded event collectors.
//!
//! A [`Collector`] subscribes to an [`UpdateSource`], keeps the events its
//! [`Matcher`] accepts (and its filter approves) in a [`Collection`], and ends
//! exactly once: when the capacity is reached, when the deadline elapses, or
//! when stopped. Ending releases the subscription and the timer.

use std::{
    fmt,
    hash::Hash,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tokio::{
    runtime::Handle,
    sync::{broadcast, watch},
    time::Instant,
};

use crate::{
    collection::Collection,
    errors::Error,
    updates::{
        port::{Subscription, UpdateSource},
        types::{EventKind, UpdateEvent},
    },
    Result,
};

mod inline_keyboard;
mod message;
mod reaction;
mod timer;

pub use inline_keyboard::{
    await_callback_queries, await_callback_query, InlineKeyboardCollector, InlineKeyboardMatcher,
};
pub use message::{await_message, await_messages, MessageCollector, MessageMatcher};
pub use reaction::{await_reactions, ReactionCollector, ReactionMatcher};

use timer::DeadlineTimer;

/// Time budget used when none is configured.
pub const DEFAULT_TIME: Duration = Duration::from_millis(60_000);

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Extracts a keyed value from a raw update, or rejects it as out of scope.
pub trait Matcher: Send + Sync + 'static {
    type Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;
    type Value: Clone + fmt::Debug + Send + Sync + 'static;

    /// Event names to subscribe to on the source.
    fn kinds(&self) -> &'static [EventKind];

    fn extract(&self, event: &UpdateEvent) -> Option<(Self::Key, Self::Value)>;
}

/// Caller-supplied predicate. An `Err` rejects the event and is reported on
/// the event channel; it does not end the collector.
pub type Filter<M> = Arc<
    dyn Fn(&<M as Matcher>::Value, &<M as Matcher>::Key, &Collector<M>) -> anyhow::Result<bool>
        + Send
        + Sync,
>;

/// Why a collector ended.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Capacity reached.
    Limit,
    /// Deadline elapsed.
    Time,
    /// Too many matched events, accepted or not.
    ProcessedLimit,
    /// Stopped by the caller without a reason.
    User,
    Custom(String),
}

impl EndReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Limit => "limit",
            Self::Time => "time",
            Self::ProcessedLimit => "processedLimit",
            Self::User => "user",
            Self::Custom(s) => s,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EndReason {
    fn from(s: &str) -> Self {
        match s {
            "limit" => Self::Limit,
            "time" => Self::Time,
            "processedLimit" => Self::ProcessedLimit,
            "user" => Self::User,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for EndReason {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

/// Terminal notification payload.
#[derive(Clone, Debug)]
pub struct CollectorEnd<K, V> {
    pub collected: Collection<K, V>,
    pub reason: EndReason,
}

/// Everything a collector publishes on its event channel.
#[derive(Clone, Debug)]
pub enum CollectorEvent<K, V> {
    Collect { key: K, value: V },
    /// Matched but rejected by the filter.
    Ignore { key: K, value: V },
    /// The filter failed; the event was treated as rejected.
    Error { key: K, message: String },
    /// Sent exactly once.
    End(CollectorEnd<K, V>),
}

pub struct CollectorOptions<M: Matcher> {
    pub filter: Option<Filter<M>>,
    /// `None` disables the deadline.
    pub time: Option<Duration>,
    /// `None` is unbounded.
    pub max: Option<usize>,
    pub max_processed: Option<usize>,
}

impl<M: Matcher> Default for CollectorOptions<M> {
    fn default() -> Self {
        Self {
            filter: None,
            time: Some(DEFAULT_TIME),
            max: None,
            max_processed: None,
        }
    }
}

impl<M: Matcher> Clone for CollectorOptions<M> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            time: self.time,
            max: self.max,
            max_processed: self.max_processed,
        }
    }
}

impl<M: Matcher> fmt::Debug for CollectorOptions<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorOptions")
            .field("filter", &self.filter.is_some())
            .field("time", &self.time)
            .field("max", &self.max)
            .field("max_processed", &self.max_processed)
            .finish()
    }
}

impl<M: Matcher> CollectorOptions<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(
        self,
        f: impl Fn(&M::Value, &M::Key, &Collector<M>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.try_filter(move |v, k, c| Ok(f(v, k, c)))
    }

    pub fn try_filter(
        mut self,
        f: impl Fn(&M::Value, &M::Key, &Collector<M>) -> anyhow::Result<bool>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(f));
        self
    }

    pub fn time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }

    pub fn no_time(mut self) -> Self {
        self.time = None;
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn max_processed(mut self, max: usize) -> Self {
        self.max_processed = Some(max);
        self
    }
}

/// Options for the `await_*` adapters.
pub struct AwaitOptions<M: Matcher> {
    pub collector: CollectorOptions<M>,
    /// End reasons that reject instead of resolving.
    pub errors: Vec<EndReason>,
}

impl<M: Matcher> Default for AwaitOptions<M> {
    fn default() -> Self {
        Self {
            collector: CollectorOptions::default(),
            errors: Vec::new(),
        }
    }
}

impl<M: Matcher> From<CollectorOptions<M>> for AwaitOptions<M> {
    fn from(collector: CollectorOptions<M>) -> Self {
        Self {
            collector,
            errors: Vec::new(),
        }
    }
}

impl<M: Matcher> AwaitOptions<M> {
    pub fn reject_on(mut self, reason: impl Into<EndReason>) -> Self {
        self.errors.push(reason.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Running,
    Ended,
}

struct State<M: Matcher> {
    filter: Option<Filter<M>>,
    max: Option<usize>,
    max_processed: Option<usize>,
    collected: Collection<M::Key, M::Value>,
    received: usize,
    phase: Phase,
    end_reason: Option<EndReason>,
    subscription: Option<Subscription>,
    timer: Option<DeadlineTimer>,
    // Bumped on every re-arm so a stale timer cannot end the collector.
    timer_generation: u64,
}

/// Resources released once the collector has ended.
type Released = (Option<Subscription>, Option<DeadlineTimer>);

struct Inner<M: Matcher> {
    matcher: M,
    state: Mutex<State<M>>,
    events: broadcast::Sender<CollectorEvent<M::Key, M::Value>>,
    ended: watch::Sender<Option<CollectorEnd<M::Key, M::Value>>>,
    runtime: Option<Handle>,
}

/// Generic bounded aggregator. Cheap to clone; clones share state.
pub struct Collector<M: Matcher> {
    inner: Arc<Inner<M>>,
}

impl<M: Matcher> Clone for Collector<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Matcher> fmt::Debug for Collector<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("Collector")
            .field("phase", &st.phase)
            .field("count", &st.collected.len())
            .field("end_reason", &st.end_reason)
            .finish()
    }
}

impl<M: Matcher> Collector<M> {
    /// Subscribe `matcher` to `source` and start collecting.
    ///
    /// A deadline needs a tokio runtime; without one a timed collector fails
    /// to construct.
    pub fn attach(
        source: &dyn UpdateSource,
        matcher: M,
        options: CollectorOptions<M>,
    ) -> Result<Self> {
        if options.max == Some(0) {
            return Err(Error::Construction("max must be at least 1".to_string()));
        }
        if options.max_processed == Some(0) {
            return Err(Error::Construction(
                "max_processed must be at least 1".to_string(),
            ));
        }

        let runtime = Handle::try_current().ok();
        if options.time.is_some() && runtime.is_none() {
            return Err(Error::Construction(
                "a tokio runtime is required for a collector with a deadline".to_string(),
            ));
        }

        let kinds = matcher.kinds();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (ended, _) = watch::channel(None);
        let collector = Self {
            inner: Arc::new(Inner {
                matcher,
                state: Mutex::new(State {
                    filter: options.filter,
                    max: options.max,
                    max_processed: options.max_processed,
                    collected: Collection::new(),
                    received: 0,
                    phase: Phase::Running,
                    end_reason: None,
                    subscription: None,
                    timer: None,
                    timer_generation: 0,
                }),
                events,
                ended,
                runtime,
            }),
        };

        let weak = Arc::downgrade(&collector.inner);
        let subscription = source.subscribe(
            kinds,
            Arc::new(move |event: &UpdateEvent| {
                if let Some(inner) = weak.upgrade() {
                    Collector { inner }.handle_event(event);
                }
            }),
        );

        {
            let mut st = collector.lock();
            if st.phase == Phase::Running {
                st.subscription = Some(subscription);
                if let Some(time) = options.time {
                    collector.arm_timer(&mut st, time);
                }
            } else {
                drop(st);
                subscription.unsubscribe();
            }
        }

        tracing::debug!(?kinds, "collector attached");
        Ok(collector)
    }

    fn lock(&self) -> MutexGuard<'_, State<M>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry point for the source subscription.
    pub fn handle_event(&self, event: &UpdateEvent) {
        let Some((key, value)) = self.inner.matcher.extract(event) else {
            return;
        };

        let filter = {
            let mut st = self.lock();
            if st.phase == Phase::Ended {
                return;
            }
            st.received += 1;
            st.filter.clone()
        };

        // The filter runs unlocked: it may call back into the collector.
        let verdict = match filter {
            None => Ok(true),
            Some(filter) => match catch_unwind(AssertUnwindSafe(|| filter(&value, &key, self))) {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(panic) => Err(panic_message(&*panic)),
            },
        };

        let released = {
            let mut st = self.lock();
            if st.phase == Phase::Ended {
                return;
            }

            let accepted = match verdict {
                Ok(accepted) => accepted,
                Err(message) => {
                    tracing::warn!(?key, error = %message, "collector filter failed");
                    let _ = self.inner.events.send(CollectorEvent::Error {
                        key: key.clone(),
                        message,
                    });
                    false
                }
            };

            let mut reason = None;
            if accepted {
                tracing::debug!(?key, "collected");
                st.collected.set(key.clone(), value.clone());
                let _ = self.inner.events.send(CollectorEvent::Collect { key, value });
                if st.max.is_some_and(|max| st.collected.len() >= max) {
                    reason = Some(EndReason::Limit);
                }
            } else {
                tracing::debug!(?key, "ignored");
                let _ = self.inner.events.send(CollectorEvent::Ignore { key, value });
            }

            if reason.is_none() && st.max_processed.is_some_and(|max| st.received >= max) {
                reason = Some(EndReason::ProcessedLimit);
            }

            reason.and_then(|r| self.end_locked(&mut st, r))
        };

        release(released);
    }

    /// Values collected so far, in insertion order.
    pub fn collected(&self) -> Vec<M::Value> {
        self.lock().collected.to_vec()
    }

    /// Copy of the underlying collection.
    pub fn snapshot(&self) -> Collection<M::Key, M::Value> {
        self.lock().collected.clone()
    }

    pub fn count(&self) -> usize {
        self.lock().collected.len()
    }

    /// Matched events seen so far, accepted or not.
    pub fn received(&self) -> usize {
        self.lock().received
    }

    /// Returns whether anything was removed.
    pub fn clear(&self) -> bool {
        let mut st = self.lock();
        let had = !st.collected.is_empty();
        st.collected.clear();
        had
    }

    /// Replace the filter. Existing entries and the deadline are kept.
    /// Returns `false` once the collector has ended.
    pub fn set_filter(
        &self,
        f: impl Fn(&M::Value, &M::Key, &Collector<M>) -> bool + Send + Sync + 'static,
    ) -> bool {
        self.set_try_filter(move |v, k, c| Ok(f(v, k, c)))
    }

    pub fn set_try_filter(
        &self,
        f: impl Fn(&M::Value, &M::Key, &Collector<M>) -> anyhow::Result<bool>
            + Send
            + Sync
            + 'static,
    ) -> bool {
        let mut st = self.lock();
        if st.phase == Phase::Ended {
            return false;
        }
        st.filter = Some(Arc::new(f));
        true
    }

    /// Restart the deadline `time` from now.
    ///
    /// Returns `false` when the collector has ended or no runtime is available.
    pub fn set_time(&self, time: Duration) -> bool {
        let mut st = self.lock();
        if st.phase == Phase::Ended {
            return false;
        }
        if self.runtime().is_none() {
            return false;
        }
        self.arm_timer(&mut st, time)
    }

    /// Update the capacity; ends immediately if it is already reached.
    ///
    /// A capacity of zero is rejected, as at construction, and returns `false`.
    pub fn set_max(&self, max: usize) -> bool {
        if max == 0 {
            return false;
        }
        let released = {
            let mut st = self.lock();
            if st.phase == Phase::Ended {
                return false;
            }
            st.max = Some(max);
            if st.collected.len() >= max {
                self.end_locked(&mut st, EndReason::Limit)
            } else {
                None
            }
        };
        release(released);
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock().phase == Phase::Running
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.lock().end_reason.clone()
    }

    /// When the armed deadline elapses, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.lock().timer.as_ref().map(DeadlineTimer::deadline)
    }

    /// Stop with reason `user`.
    pub fn stop(&self) {
        self.stop_with(EndReason::User);
    }

    /// No-op once ended.
    pub fn stop_with(&self, reason: impl Into<EndReason>) {
        let released = {
            let mut st = self.lock();
            self.end_locked(&mut st, reason.into())
        };
        release(released);
    }

    /// Listen to collect/ignore/error/end events from now on.
    ///
    /// Slow receivers may lag and lose events; the terminal notification is
    /// also available through [`Collector::ended`].
    pub fn subscribe(&self) -> broadcast::Receiver<CollectorEvent<M::Key, M::Value>> {
        self.inner.events.subscribe()
    }

    /// Resolves with the terminal notification (immediately if already ended).
    pub async fn ended(&self) -> CollectorEnd<M::Key, M::Value> {
        let mut rx = self.inner.ended.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(end) = current {
                return end;
            }
            if rx.changed().await.is_err() {
                // The sender lives in `self`, so this only happens on teardown.
                return CollectorEnd {
                    collected: self.snapshot(),
                    reason: self.end_reason().unwrap_or(EndReason::User),
                };
            }
        }
    }

    fn runtime(&self) -> Option<Handle> {
        self.inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    fn arm_timer(&self, st: &mut State<M>, time: Duration) -> bool {
        let Some(runtime) = self.runtime() else {
            return false;
        };
        if let Some(old) = st.timer.take() {
            old.cancel();
        }
        st.timer_generation += 1;
        let generation = st.timer_generation;
        let weak: Weak<Inner<M>> = Arc::downgrade(&self.inner);
        st.timer = Some(DeadlineTimer::arm(&runtime, time, move || {
            if let Some(inner) = weak.upgrade() {
                Collector { inner }.on_deadline(generation);
            }
        }));
        true
    }

    fn on_deadline(&self, generation: u64) {
        let released = {
            let mut st = self.lock();
            if st.timer_generation != generation {
                return;
            }
            self.end_locked(&mut st, EndReason::Time)
        };
        release(released);
    }

    /// The only transition to `Ended`. Returns the resources to release once
    /// the state lock is dropped, or `None` if already ended.
    fn end_locked(&self, st: &mut State<M>, reason: EndReason) -> Option<Released> {
        if st.phase == Phase::Ended {
            return None;
        }
        st.phase = Phase::Ended;
        st.end_reason = Some(reason.clone());

        tracing::info!(%reason, collected = st.collected.len(), "collector ended");

        let end = CollectorEnd {
            collected: st.collected.clone(),
            reason,
        };
        let _ = self.inner.events.send(CollectorEvent::End(end.clone()));
        self.inner.ended.send_replace(Some(end));

        Some((st.subscription.take(), st.timer.take()))
    }
}

fn release(released: Option<Released>) {
    let Some((subscription, timer)) = released else {
        return;
    };
    if let Some(timer) = timer {
        timer.cancel();
    }
    if let Some(subscription) = subscription {
        subscription.unsubscribe();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        return format!("filter panicked: {s}");
    }
    if let Some(s) = panic.downcast_ref::<String>() {
        return format!("filter panicked: {s}");
    }
    "filter panicked".to_string()
}

/// Drive a collector to its end and resolve with what it gathered.
pub(crate) async fn await_end<M: Matcher>(
    source: &dyn UpdateSource,
    matcher: M,
    options: AwaitOptions<M>,
) -> Result<CollectorEnd<M::Key, M::Value>> {
    let collector = Collector::attach(source, matcher, options.collector)?;
    let end = collector.ended().await;
    if options.errors.contains(&end.reason) {
        return Err(Error::CollectorEnded { reason: end.reason });
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Chat, ChatId, Message, MessageId},
        updates::bus::UpdateBus,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Keys messages by `text`, so tests can feed repeated keys.
    struct ByText;

    impl Matcher for ByText {
        type Key = String;
        type Value = i32;

        fn kinds(&self) -> &'static [EventKind] {
            &[EventKind::Message]
        }

        fn extract(&self, event: &UpdateEvent) -> Option<(String, i32)> {
            match event {
                UpdateEvent::Message(m) => Some((m.text.clone()?, m.id.0)),
                _ => None,
            }
        }
    }

    fn msg(id: i32, text: &str) -> UpdateEvent {
        UpdateEvent::Message(Arc::new(Message {
            id: MessageId(id),
            chat: Chat::private(ChatId(1)),
            from: None,
            date: chrono::Utc::now(),
            text: Some(text.to_string()),
            caption: None,
        }))
    }

    fn drain_ends<K, V>(rx: &mut broadcast::Receiver<CollectorEvent<K, V>>) -> Vec<EndReason>
    where
        K: Clone,
        V: Clone,
    {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let CollectorEvent::End(end) = ev {
                out.push(end.reason);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_upserts_then_limit_ends() {
        let bus = UpdateBus::new();
        let c = Collector::attach(
            &bus,
            ByText,
            CollectorOptions::new().max(2).time(Duration::from_secs(3600)),
        )
        .unwrap();
        let mut rx = c.subscribe();

        bus.dispatch(&msg(1, "a"));
        bus.dispatch(&msg(2, "a"));
        assert_eq!(c.count(), 1);
        assert!(c.is_running());
        assert_eq!(c.collected(), vec![2]);

        bus.dispatch(&msg(3, "b"));
        assert_eq!(c.count(), 2);
        assert!(!c.is_running());
        assert_eq!(c.end_reason(), Some(EndReason::Limit));
        assert_eq!(drain_ends(&mut rx), vec![EndReason::Limit]);

        // Subscription and timer are gone.
        assert_eq!(bus.subscriber_count(), 0);
        assert!(c.deadline().is_none());

        let end = c.ended().await;
        assert_eq!(end.reason, EndReason::Limit);
        assert_eq!(end.collected.key_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_ends_with_time() {
        let bus = UpdateBus::new();
        let c = Collector::attach(
            &bus,
            ByText,
            CollectorOptions::new().time(Duration::from_millis(500)),
        )
        .unwrap();
        bus.dispatch(&msg(1, "a"));

        let end = c.ended().await;
        assert_eq!(end.reason, EndReason::Time);
        assert_eq!(end.collected.len(), 1);
        assert_eq!(bus.subscriber_count(), 0);

        bus.dispatch(&msg(2, "b"));
        assert_eq!(c.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_time_restarts_from_now() {
        let bus = UpdateBus::new();
        let c = Collector::attach(&bus, ByText, CollectorOptions::new().time(Duration::from_secs(1)))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(c.set_time(Duration::from_secs(1)));

        // The original deadline passes without ending.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(c.is_running());

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!c.is_running());
        assert_eq!(c.end_reason(), Some(EndReason::Time));
        assert!(!c.set_time(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn set_max_at_or_below_count_ends_immediately() {
        let bus = UpdateBus::new();
        let c = Collector::attach(&bus, ByText, CollectorOptions::new().no_time()).unwrap();
        bus.dispatch(&msg(1, "a"));
        bus.dispatch(&msg(2, "b"));
        assert!(c.set_max(5));
        assert!(c.is_running());

        assert!(c.set_max(2));
        assert!(!c.is_running());
        assert_eq!(c.end_reason(), Some(EndReason::Limit));
        assert!(!c.set_max(10));
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected_like_at_construction() {
        let bus = UpdateBus::new();
        assert!(Collector::attach(&bus, ByText, CollectorOptions::new().max(0)).is_err());

        let c =
            Collector::attach(&bus, ByText, CollectorOptions::new().no_time().max(3)).unwrap();
        bus.dispatch(&msg(1, "a"));
        assert!(!c.set_max(0));
        assert!(c.is_running());
        assert_eq!(c.end_reason(), None);

        bus.dispatch(&msg(2, "b"));
        bus.dispatch(&msg(3, "c"));
        assert_eq!(c.end_reason(), Some(EndReason::Limit));
    }

    #[tokio::test]
    async fn stop_twice_notifies_once() {
        let bus = UpdateBus::new();
        let c = Collector::attach(&bus, ByText, CollectorOptions::new()).unwrap();
        let mut rx = c.subscribe();

        c.stop();
        c.stop_with("later");
        assert_eq!(drain_ends(&mut rx), vec![EndReason::User]);
        assert_eq!(c.end_reason(), Some(EndReason::User));
    }

    #[tokio::test]
    async fn custom_stop_reason_round_trips() {
        let bus = UpdateBus::new();
        let c = Collector::attach(&bus, ByText, CollectorOptions::new()).unwrap();
        c.stop_with("cancelled");
        let end = c.ended().await;
        assert_eq!(end.reason, EndReason::Custom("cancelled".to_string()));
        assert_eq!(end.reason.to_string(), "cancelled");
    }

    #[tokio::test]
    async fn filter_sees_collector_and_can_be_swapped() {
        let bus = UpdateBus::new();
        let c = Collector::attach(
            &bus,
            ByText,
            CollectorOptions::<ByText>::new()
                .no_time()
                .filter(|_, _, col| col.count() < 1),
        )
        .unwrap();
        let mut rx = c.subscribe();

        bus.dispatch(&msg(1, "a"));
        bus.dispatch(&msg(2, "b"));
        assert_eq!(c.collected(), vec![1]);
        assert_eq!(c.received(), 2);

        assert!(c.set_filter(|v, _, _| v % 2 == 1));
        bus.dispatch(&msg(3, "c"));
        bus.dispatch(&msg(4, "d"));
        assert_eq!(c.collected(), vec![1, 3]);

        let mut ignored = 0;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, CollectorEvent::Ignore { .. }) {
                ignored += 1;
            }
        }
        assert_eq!(ignored, 2);
    }

    #[tokio::test]
    async fn failing_filter_is_reported_and_collector_keeps_running() {
        let bus = UpdateBus::new();
        let c = Collector::attach(
            &bus,
            ByText,
            CollectorOptions::<ByText>::new().no_time().try_filter(|v, _, _| {
                if *v == 2 {
                    anyhow::bail!("bad value");
                }
                if *v == 3 {
                    panic!("boom");
                }
                Ok(true)
            }),
        )
        .unwrap();
        let mut rx = c.subscribe();

        for (id, text) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
            bus.dispatch(&msg(id, text));
        }

        assert!(c.is_running());
        assert_eq!(c.collected(), vec![1, 4]);

        let mut errors = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let CollectorEvent::Error { message, .. } = ev {
                errors.push(message);
            }
        }
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("bad value"));
        assert!(errors[1].contains("boom"));
    }

    #[tokio::test]
    async fn max_processed_counts_rejected_events() {
        let bus = UpdateBus::new();
        let c = Collector::attach(
            &bus,
            ByText,
            CollectorOptions::<ByText>::new()
                .no_time()
                .max_processed(3)
                .filter(|_, _, _| false),
        )
        .unwrap();
        for id in 1..=3 {
            bus.dispatch(&msg(id, "x"));
        }
        assert_eq!(c.end_reason(), Some(EndReason::ProcessedLimit));
        assert_eq!(c.count(), 0);
    }

    #[tokio::test]
    async fn clear_reports_removal() {
        let bus = UpdateBus::new();
        let c = Collector::attach(&bus, ByText, CollectorOptions::new()).unwrap();
        assert!(!c.clear());
        bus.dispatch(&msg(1, "a"));
        assert!(c.clear());
        assert_eq!(c.count(), 0);
        assert!(c.is_running());
    }

    #[tokio::test]
    async fn concurrent_collectors_are_independent() {
        let bus = UpdateBus::new();
        let a = Collector::attach(&bus, ByText, CollectorOptions::new().max(1)).unwrap();
        let b = Collector::attach(&bus, ByText, CollectorOptions::new().max(3)).unwrap();

        bus.dispatch(&msg(1, "x"));
        assert!(!a.is_running());
        assert!(b.is_running());
        assert_eq!(bus.subscriber_count(), 1);

        bus.dispatch(&msg(2, "y"));
        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 2);
    }

    #[test]
    fn timed_collector_needs_a_runtime() {
        let bus = UpdateBus::new();
        let err = Collector::attach(&bus, ByText, CollectorOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));

        let untimed = Collector::attach(&bus, ByText, CollectorOptions::new().no_time()).unwrap();
        assert!(!untimed.set_time(Duration::from_secs(1)));
        assert!(untimed.is_running());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let bus = UpdateBus::new();
        let err = Collector::attach(&bus, ByText, CollectorOptions::new().no_time().max(0))
            .unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn dropping_last_handle_releases_subscription() {
        let bus = UpdateBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let c = Collector::attach(
            &bus,
            ByText,
            CollectorOptions::<ByText>::new().no_time().filter(move |_, _, _| {
                h.fetch_add(1, Ordering::SeqCst);
                true
            }),
        )
        .unwrap();
        bus.dispatch(&msg(1, "a"));
        drop(c);
        assert_eq!(bus.subscriber_count(), 0);
        bus.dispatch(&msg(2, "b"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn await_end_rejects_on_listed_reason() {
        let bus = UpdateBus::new();
        let fut = await_end(
            &bus,
            ByText,
            AwaitOptions::from(CollectorOptions::new().time(Duration::from_millis(10)))
                .reject_on("time"),
        );
        let err = fut.await.unwrap_err();
        assert!(matches!(err, Error::CollectorEnded { reason: EndReason::Time }));
    }
}
