use std::collections::HashMap;
use tokio::sync::{ watch, Mutex };
use tokio_stream::wrappers::WatchStream;

/// Live view of an ordered collection. Every store write replaces the whole
/// snapshot; observers that fall behind only ever see the latest one.
pub struct Subscription<T> {
    rx: watch::Receiver<Vec<T>>,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    /// Snapshot current at subscribe time, or after the last `next`.
    pub fn snapshot(&self) -> Vec<T> {
        self.rx.borrow().clone()
    }

    /// Waits for the next write. `None` once the collection is gone.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stream starting with the current snapshot.
    pub fn into_stream(self) -> WatchStream<Vec<T>> {
        WatchStream::new(self.rx)
    }
}

/// Per-key fan-out of snapshots. Callers must serialize `subscribe` and
/// `publish` for a key with the write that produced the snapshot.
pub struct Hub<T> {
    channels: Mutex<HashMap<String, watch::Sender<Vec<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Default for Hub<T> {
    fn default() -> Self {
        Self { channels: Mutex::new(HashMap::new()) }
    }
}

impl<T: Clone + Send + Sync + 'static> Hub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, key: &str, current: Vec<T>) -> Subscription<T> {
        let mut channels = self.channels.lock().await;
        if let Some(tx) = channels.get(key) {
            if tx.receiver_count() > 0 {
                return Subscription { rx: tx.subscribe() };
            }
        }
        // An idle channel may hold a snapshot older than `current`.
        let (tx, rx) = watch::channel(current);
        channels.insert(key.to_string(), tx);
        Subscription { rx }
    }

    pub async fn publish(&self, key: &str, snapshot: Vec<T>) {
        let mut channels = self.channels.lock().await;
        let idle = match channels.get(key) {
            Some(tx) if tx.receiver_count() > 0 => {
                tx.send_replace(snapshot);
                false
            }
            Some(_) => true,
            None => false,
        };
        if idle {
            channels.remove(key);
        }
    }

    /// Sends a final snapshot and ends every subscription on `key`.
    pub async fn close(&self, key: &str, last: Vec<T>) {
        if let Some(tx) = self.channels.lock().await.remove(key) {
            tx.send_replace(last);
        }
    }

    pub async fn subscriber_count(&self, key: &str) -> usize {
        self.channels
            .lock().await
            .get(key)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn subscribers_see_published_snapshots() {
        let hub: Hub<u32> = Hub::new();
        let mut sub = hub.subscribe("k", vec![1]).await;
        assert_eq!(sub.snapshot(), vec![1]);

        hub.publish("k", vec![1, 2]).await;
        assert_eq!(sub.next().await, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn late_subscriber_joins_existing_channel() {
        let hub: Hub<u32> = Hub::new();
        let _first = hub.subscribe("k", vec![]).await;
        hub.publish("k", vec![7]).await;

        let second = hub.subscribe("k", vec![]).await;
        assert_eq!(second.snapshot(), vec![7]);
        assert_eq!(hub.subscriber_count("k").await, 2);
    }

    #[tokio::test]
    async fn idle_channels_are_dropped_on_publish() {
        let hub: Hub<u32> = Hub::new();
        drop(hub.subscribe("k", vec![]).await);
        hub.publish("k", vec![1]).await;
        assert_eq!(hub.subscriber_count("k").await, 0);
    }

    #[tokio::test]
    async fn idle_channel_is_replaced_by_a_fresh_snapshot() {
        let hub: Hub<u32> = Hub::new();
        let sub = hub.subscribe("k", vec![1]).await;
        drop(sub);

        let sub = hub.subscribe("k", vec![1, 2]).await;
        assert_eq!(sub.snapshot(), vec![1, 2]);
        assert_eq!(hub.subscriber_count("k").await, 1);
    }

    #[tokio::test]
    async fn close_ends_the_stream_after_last_snapshot() {
        let hub: Hub<u32> = Hub::new();
        let sub = hub.subscribe("k", vec![1]).await;
        let mut stream = sub.into_stream();
        assert_eq!(stream.next().await, Some(vec![1]));

        hub.close("k", vec![]).await;
        assert_eq!(stream.next().await, Some(vec![]));
        assert_eq!(stream.next().await, None);
    }
}
