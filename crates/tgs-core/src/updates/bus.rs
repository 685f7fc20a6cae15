use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock, Weak,
};

use crate::updates::{
    port::{EventHandler, Subscription, UpdateSource},
    types::{EventKind, UpdateEvent},
};

struct Registered {
    id: u64,
    kinds: Vec<EventKind>,
    handler: EventHandler,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    handlers: RwLock<Vec<Registered>>,
}

impl BusInner {
    fn remove(&self, id: u64) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers.retain(|h| h.id != id);
    }
}

/// In-memory update source.
///
/// Adapters (polling, webhooks, tests) push updates with [`UpdateBus::dispatch`];
/// collectors attach through the [`UpdateSource`] capability. Each registered
/// handler sees a given dispatch at most once.
#[derive(Clone, Default)]
pub struct UpdateBus {
    inner: Arc<BusInner>,
}

impl UpdateBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every handler registered for its kind, in
    /// registration order. Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &UpdateEvent) -> usize {
        let kind = event.kind();
        // Snapshot so handlers may (un)subscribe while we iterate.
        let targets: Vec<EventHandler> = {
            let handlers = self
                .inner
                .handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            handlers
                .iter()
                .filter(|h| h.kinds.contains(&kind))
                .map(|h| h.handler.clone())
                .collect()
        };

        for handler in &targets {
            handler(event);
        }
        targets.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl UpdateSource for UpdateBus {
    fn subscribe(&self, kinds: &[EventKind], handler: EventHandler) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut handlers = self
                .inner
                .handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            handlers.push(Registered {
                id,
                kinds: kinds.to_vec(),
                handler,
            });
        }

        let weak: Weak<BusInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Chat, ChatId, Message, MessageId};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn message(id: i32) -> UpdateEvent {
        UpdateEvent::Message(Arc::new(Message {
            id: MessageId(id),
            chat: Chat::private(ChatId(1)),
            from: None,
            date: chrono::Utc::now(),
            text: Some("hi".to_string()),
            caption: None,
        }))
    }

    #[test]
    fn dispatches_only_to_matching_kinds() {
        let bus = UpdateBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        let _msg = bus.subscribe(
            &[EventKind::Message],
            Arc::new(move |_: &UpdateEvent| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let h = hits.clone();
        let _cb = bus.subscribe(
            &[EventKind::CallbackQuery],
            Arc::new(move |_: &UpdateEvent| {
                h.fetch_add(100, Ordering::SeqCst);
            }),
        );

        assert_eq!(bus.dispatch(&message(1)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_detaches_handler() {
        let bus = UpdateBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = bus.subscribe(
            &[EventKind::Message],
            Arc::new(move |_: &UpdateEvent| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(bus.subscriber_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.dispatch(&message(1)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_dispatch() {
        let bus = UpdateBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let s = slot.clone();
        let sub = bus.subscribe(
            &[EventKind::Message],
            Arc::new(move |_: &UpdateEvent| {
                if let Some(sub) = s.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            }),
        );
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(bus.dispatch(&message(1)), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
