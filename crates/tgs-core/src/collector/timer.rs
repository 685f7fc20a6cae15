use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// One-shot cancellable deadline.
///
/// The callback runs on the runtime unless the timer is cancelled (or dropped)
/// first.
#[derive(Debug)]
pub(crate) struct DeadlineTimer {
    cancel: CancellationToken,
    deadline: Instant,
}

impl DeadlineTimer {
    pub(crate) fn arm(
        runtime: &Handle,
        after: Duration,
        on_fire: impl FnOnce() + Send + 'static,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let deadline = Instant::now() + after;
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep_until(deadline) => on_fire(),
            }
        });
        Self { cancel, deadline }
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
