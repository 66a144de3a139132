// Poll Cancellation Token
//
// Navigating away from a lead must stop its poller without leaking timers;
// the handle lives with the lead's slot, the token travels into the poll.

use tokio::sync::watch;

/// Cancellation signal observed by a running poll
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the cancellation signal
    pub async fn cancelled(&mut self) {
        let _ = self.rx.changed().await;
    }
}

/// Cancellation trigger held by the owner of the operation
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation to the running poll
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a cancellation pair
pub fn cancel_channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}
