//! Push-replace subscriptions.
//!
//! A [`Feed`] holds the latest full, freshly ordered list of a collection.
//! There is no incremental merge: each publish replaces whatever subscribers
//! held before, and a subscriber that falls behind only ever sees the newest
//! snapshot.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A shared collection snapshot.
pub type Snapshot<T> = Arc<Vec<T>>;

/// A collection snapshot broadcaster.
pub struct Feed<T> {
    sender: watch::Sender<Snapshot<T>>,
}

impl<T> Default for Feed<T> {
    fn default() -> Self {
        let (sender, _) = watch::channel(Arc::new(Vec::new()));
        Self { sender }
    }
}

impl<T> std::fmt::Debug for Feed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T> Feed<T> {
    /// Creates a feed with no subscribers and an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. It stays registered until the returned
    /// handle is dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe(&self) -> Subscription<T> {
        let receiver = self.sender.subscribe();
        debug!("Feed subscriber registered ({} live)", self.subscriber_count());
        Subscription { receiver }
    }

    /// Replaces the current snapshot and wakes every subscriber.
    pub fn publish(&self, snapshot: Vec<T>) {
        // send_replace stores the value even with no receivers
        self.sender.send_replace(Arc::new(snapshot));
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Handle returned by [`Feed::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription<T> {
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T> Subscription<T> {
    /// The latest snapshot, marking it as seen.
    pub fn snapshot(&mut self) -> Snapshot<T> {
        Arc::clone(&self.receiver.borrow_and_update())
    }

    /// Whether a snapshot newer than the last one seen is waiting.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Waits for the next snapshot. Returns `None` once the feed is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.snapshot())
    }

    /// Stops delivery to this subscriber.
    pub fn unsubscribe(self) {
        debug!("Feed subscriber removed");
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pending", &self.has_changed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_replaces_snapshot() {
        let feed: Feed<i32> = Feed::new();
        let mut sub = feed.subscribe();
        assert!(sub.snapshot().is_empty());

        feed.publish(vec![3, 2, 1]);
        feed.publish(vec![4, 3]);
        assert!(sub.has_changed());
        assert_eq!(*sub.changed().await.unwrap_or_default(), vec![4, 3]);
        assert!(!sub.has_changed());
    }

    #[tokio::test]
    async fn test_unsubscribe_and_drop() {
        let feed: Feed<&'static str> = Feed::new();
        let first = feed.subscribe();
        let second = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 2);

        first.unsubscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(second);
        assert_eq!(feed.subscriber_count(), 0);

        // Publishing with nobody listening still keeps the snapshot
        feed.publish(vec!["c"]);
        let mut late = feed.subscribe();
        assert_eq!(*late.snapshot(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_handle_outliving_feed() {
        let feed: Feed<u8> = Feed::new();
        let mut sub = feed.subscribe();
        drop(feed);
        assert!(sub.changed().await.is_none());
    }
}
