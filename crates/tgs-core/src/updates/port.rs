use std::sync::{Arc, Mutex, PoisonError};

use crate::updates::types::{EventKind, UpdateEvent};

/// Callback invoked by a source for every matching update.
///
/// Handlers run inside the source's dispatch; they must not block.
pub type EventHandler = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Subscribe/unsubscribe capability injected into collectors.
pub trait UpdateSource: Send + Sync {
    /// Register `handler` for every event whose kind is in `kinds`.
    ///
    /// One handle covers all requested kinds.
    fn subscribe(&self, kinds: &[EventKind], handler: EventHandler) -> Subscription;
}

type Release = Box<dyn FnOnce() + Send>;

/// Handle returned by [`UpdateSource::subscribe`].
///
/// `unsubscribe` is idempotent; dropping the handle unsubscribes as well.
pub struct Subscription {
    release: Mutex<Option<Release>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// A handle that owns nothing (for sources without teardown).
    pub fn detached() -> Self {
        Self {
            release: Mutex::new(None),
        }
    }

    pub fn unsubscribe(&self) {
        let release = self
            .release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(release) = release {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
