//! In-process event relay.
//!
//! Publishers post a string payload on a named channel; every listener
//! currently registered on that channel receives it. There is no replay:
//! listeners only see payloads published after they registered, and a
//! payload published with no listeners is dropped.
//!
//! Each listener queue holds at most `capacity` payloads. A listener that
//! falls further behind loses the oldest ones and keeps the newest.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Payloads a listener may have queued before the oldest are dropped
pub const DEFAULT_CAPACITY: usize = 64;

struct RelayInner {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Named-channel broadcaster shared by publishers and listeners
#[derive(Clone)]
pub struct EventRelay {
    inner: Arc<RelayInner>,
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay whose listener queues hold up to `capacity` payloads
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                channels: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Deliver `payload` to every listener on `channel`.
    ///
    /// Returns the number of listeners it reached.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        let mut channels = lock(&self.inner.channels);
        let Some(sender) = channels.get(channel) else {
            trace!("No listeners on {}, dropping event", channel);
            return 0;
        };

        match sender.send(payload.to_string()) {
            Ok(delivered) => {
                trace!("Published event on {} to {} listener(s)", channel, delivered);
                delivered
            }
            Err(_) => {
                // Every listener is gone
                trace!("No listeners on {}, dropping event", channel);
                channels.remove(channel);
                0
            }
        }
    }

    /// Register a pull-style listener on `channel`
    pub fn listen(&self, channel: &str) -> Listener {
        let capacity = self.inner.capacity;
        let rx = lock(&self.inner.channels)
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();
        debug!("Listener registered on {}", channel);

        Listener {
            channel: channel.to_string(),
            rx,
        }
    }

    /// Run `handler` on a task for every payload published on `channel`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn subscribe<F>(&self, channel: &str, mut handler: F) -> Subscription
    where
        F: FnMut(String) + Send + 'static,
    {
        let mut listener = self.listen(channel);
        let active = Arc::new(Mutex::new(true));
        let still_active = active.clone();
        let task = tokio::spawn(async move {
            while let Some(payload) = listener.recv().await {
                // Held while the handler runs so unsubscribe waits for it
                let keep_going = {
                    let guard = lock(&still_active);
                    if *guard {
                        handler(payload);
                    }
                    *guard
                };
                if !keep_going {
                    break;
                }
            }
        });

        Subscription {
            channel: channel.to_string(),
            active,
            task: Some(task),
        }
    }

    /// Number of listeners currently registered on `channel`
    pub fn listener_count(&self, channel: &str) -> usize {
        lock(&self.inner.channels)
            .get(channel)
            .map_or(0, |sender| sender.receiver_count())
    }
}

/// Receiving end of a channel registration; deregisters on drop
pub struct Listener {
    channel: String,
    rx: broadcast::Receiver<String>,
}

impl Listener {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next payload, waiting if none is queued.
    ///
    /// Returns `None` once the relay is gone.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Listener on {} lagged, skipped {} event(s)", self.channel, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next queued payload without waiting
    pub fn try_recv(&mut self) -> Option<String> {
        loop {
            match self.rx.try_recv() {
                Ok(payload) => return Some(payload),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Listener on {} lagged, skipped {} event(s)", self.channel, skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

/// Handler registration created by [`EventRelay::subscribe`]
pub struct Subscription {
    channel: String,
    active: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop delivering payloads to the handler.
    ///
    /// Once this returns the handler is not running and is never called again.
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        *lock(&self.active) = false;
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Subscription on {} removed", self.channel);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_publish_without_listeners_is_dropped() {
        let relay = EventRelay::new();
        assert_eq!(relay.publish("TextAnalysisEvent", "{}"), 0);

        // No replay for late listeners
        let mut listener = relay.listen("TextAnalysisEvent");
        assert_eq!(listener.try_recv(), None);
    }

    #[test]
    fn test_every_listener_receives_payload() {
        let relay = EventRelay::new();
        let mut a = relay.listen("TextAnalysisEvent");
        let mut b = relay.listen("TextAnalysisEvent");

        assert_eq!(relay.publish("TextAnalysisEvent", r#"{"compound":0.8}"#), 2);
        assert_eq!(a.try_recv().as_deref(), Some(r#"{"compound":0.8}"#));
        assert_eq!(b.try_recv().as_deref(), Some(r#"{"compound":0.8}"#));
    }

    #[test]
    fn test_channels_are_isolated() {
        let relay = EventRelay::new();
        let mut listener = relay.listen("TextAnalysisEvent");

        assert_eq!(relay.publish("OtherEvent", "x"), 0);
        assert_eq!(listener.try_recv(), None);
        assert_eq!(listener.channel(), "TextAnalysisEvent");
    }

    #[test]
    fn test_dropped_listener_deregisters() {
        let relay = EventRelay::new();
        let listener = relay.listen("TextAnalysisEvent");
        assert_eq!(relay.listener_count("TextAnalysisEvent"), 1);

        drop(listener);
        assert_eq!(relay.listener_count("TextAnalysisEvent"), 0);
        assert_eq!(relay.publish("TextAnalysisEvent", "x"), 0);
    }

    #[test]
    fn test_payloads_arrive_in_order() {
        let relay = EventRelay::new();
        let mut listener = relay.listen("ch");
        for i in 0..5 {
            relay.publish("ch", &i.to_string());
        }
        let received: Vec<String> = std::iter::from_fn(|| listener.try_recv()).collect();
        assert_eq!(received, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_idle_listener_keeps_only_newest() {
        let relay = EventRelay::with_capacity(8);
        let mut listener = relay.listen("ch");
        for i in 0..100 {
            relay.publish("ch", &i.to_string());
        }

        let received: Vec<String> = std::iter::from_fn(|| listener.try_recv()).collect();
        let expected: Vec<String> = (92..100).map(|i| i.to_string()).collect();
        assert_eq!(received, expected);

        // Still registered and receiving after the overflow
        relay.publish("ch", "next");
        assert_eq!(listener.try_recv().as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_recv_ends_when_relay_is_dropped() {
        let relay = EventRelay::new();
        let mut listener = relay.listen("ch");
        relay.publish("ch", "last");
        drop(relay);

        assert_eq!(listener.recv().await.as_deref(), Some("last"));
        assert_eq!(listener.recv().await, None);
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let relay = EventRelay::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = relay.subscribe("TextAnalysisEvent", move |payload| {
            sink.lock().unwrap().push(payload);
        });

        relay.publish("TextAnalysisEvent", "first");
        for _ in 0..50 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*seen.lock().unwrap(), vec!["first".to_string()]);

        subscription.unsubscribe();
        relay.publish("TextAnalysisEvent", "second");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["first".to_string()]);
        assert_eq!(relay.listener_count("TextAnalysisEvent"), 0);
    }
}
