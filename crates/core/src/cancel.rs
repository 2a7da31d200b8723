use std::sync::Arc;

use tokio::sync::watch;

/// Shared cancellation signal for one update run.
///
/// Cheap to clone and hand to every task. The first failing unit flips it;
/// siblings either observe the flag at their next loop check or, for
/// in-flight HTTP requests, race the awaitable [`Cancel::cancelled`] future
/// against the request and abandon it immediately. Retry sleeps are the one
/// exception: they are not interrupted mid-sleep, the flag is re-checked at
/// loop re-entry.
#[derive(Clone, Debug)]
pub struct Cancel {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancel {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the run is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
