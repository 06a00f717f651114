//! Handle for a live change subscription.
//!
//! A [`Subscription`] owns the receiving end of an event channel plus an
//! optional stop signal for the task that feeds it. Releasing the handle
//! (explicitly or by dropping it) stops delivery: the feeding task is told to
//! leave its channel, and any sender still holding the channel observes it as
//! closed.

use tokio::sync::{mpsc, oneshot};

/// Buffer size for subscription event channels.
pub const EVENT_BUFFER: usize = 64;

/// A push stream of change events, active until released.
#[derive(Debug)]
pub struct Subscription<T> {
    channel: String,
    events: mpsc::Receiver<T>,
    stop: Option<oneshot::Sender<()>>,
}

impl<T> Subscription<T> {
    /// Wrap an event receiver. `stop` is fired once on release.
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        events: mpsc::Receiver<T>,
        stop: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            channel: channel.into(),
            events,
            stop,
        }
    }

    /// Name of the channel this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the feeding side has gone away. Cancel-safe.
    pub async fn recv(&mut self) -> Option<T> {
        self.events.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.events.try_recv().ok()
    }

    /// Stop delivery and release the channel.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.events.close();
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
            tracing::debug!(channel = %self.channel, "Subscription released");
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
