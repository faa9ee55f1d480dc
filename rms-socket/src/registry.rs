//! Topic subscriptions and connection-status listeners.
//!
//! Callbacks are identified by their `Arc` allocation: registering the same
//! `Arc` twice is a no-op, while two separately allocated closures are two
//! subscribers even if they do the same thing.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

/// Callback invoked with the payload of every envelope on its topic.
pub type MessageCallback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Callback invoked with the new connected flag.
pub type StatusCallback = Arc<dyn Fn(bool) + Send + Sync>;

fn same_callback<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Topic -> callbacks, in registration order.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    topics: HashMap<String, Vec<MessageCallback>>,
}

impl SubscriptionRegistry {
    /// Returns false when this exact callback was already registered.
    pub fn insert(&mut self, topic: &str, callback: MessageCallback) -> bool {
        let callbacks = self.topics.entry(topic.to_string()).or_default();
        if callbacks.iter().any(|existing| same_callback(existing, &callback)) {
            return false;
        }
        callbacks.push(callback);
        true
    }

    /// Returns false when nothing matched. Drops the topic once it is empty.
    pub fn remove(&mut self, topic: &str, callback: &MessageCallback) -> bool {
        let Some(callbacks) = self.topics.get_mut(topic) else {
            return false;
        };
        let before = callbacks.len();
        callbacks.retain(|existing| !same_callback(existing, callback));
        let removed = callbacks.len() != before;
        if callbacks.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    pub fn callbacks(&self, topic: &str) -> Vec<MessageCallback> {
        self.topics.get(topic).cloned().unwrap_or_default()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, Vec::len)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.keys().cloned().collect();
        topics.sort();
        topics
    }
}

#[derive(Default)]
pub(crate) struct StatusListeners {
    listeners: Vec<StatusCallback>,
}

impl StatusListeners {
    pub fn add(&mut self, callback: StatusCallback) -> bool {
        if self.listeners.iter().any(|existing| same_callback(existing, &callback)) {
            return false;
        }
        self.listeners.push(callback);
        true
    }

    pub fn remove(&mut self, callback: &StatusCallback) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|existing| !same_callback(existing, callback));
        self.listeners.len() != before
    }

    pub fn snapshot(&self) -> Vec<StatusCallback> {
        self.listeners.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Invoke every callback with the payload; a panicking callback is logged
/// and does not stop the others.
pub(crate) fn deliver(topic: &str, payload: &serde_json::Value, callbacks: &[MessageCallback]) {
    debug!("delivering {topic} to {} subscriber(s)", callbacks.len());
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
            error!("subscriber for topic {topic} panicked");
        }
    }
}

/// Invoke every status listener; panics are isolated per listener.
pub(crate) fn notify_status(connected: bool, listeners: &[StatusCallback]) {
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| listener(connected))).is_err() {
            error!("connection status listener panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, MessageCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let callback: MessageCallback = {
            let count = count.clone();
            Arc::new(move |_: &serde_json::Value| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        (count, callback)
    }

    #[test]
    fn test_same_arc_is_idempotent() {
        let mut registry = SubscriptionRegistry::default();
        let (_, callback) = counter();
        assert!(registry.insert("new_order", callback.clone()));
        assert!(!registry.insert("new_order", callback.clone()));
        assert_eq!(registry.subscriber_count("new_order"), 1);

        // The same callback under another topic is a separate subscription.
        assert!(registry.insert("order_updates", callback));
        assert_eq!(registry.topic_count(), 2);
    }

    #[test]
    fn test_distinct_closures_are_both_kept() {
        let mut registry = SubscriptionRegistry::default();
        let (_, a) = counter();
        let (_, b) = counter();
        assert!(registry.insert("new_order", a));
        assert!(registry.insert("new_order", b));
        assert_eq!(registry.subscriber_count("new_order"), 2);
    }

    #[test]
    fn test_remove_drops_empty_topics() {
        let mut registry = SubscriptionRegistry::default();
        let (_, a) = counter();
        let (_, b) = counter();
        registry.insert("table_status_update", a.clone());
        registry.insert("table_status_update", b.clone());

        assert!(registry.remove("table_status_update", &a));
        assert_eq!(registry.topics(), vec!["table_status_update".to_string()]);
        assert!(!registry.remove("table_status_update", &a));

        assert!(registry.remove("table_status_update", &b));
        assert_eq!(registry.topic_count(), 0);
        assert!(!registry.remove("missing", &b));
    }

    #[test]
    fn test_deliver_isolates_panics() {
        let (first, a) = counter();
        let (second, b) = counter();
        let panicking: MessageCallback = Arc::new(|_: &serde_json::Value| panic!("subscriber bug"));
        deliver("new_order", &json!({"id": 1}), &[a, panicking, b]);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_status_listeners() {
        let mut listeners = StatusListeners::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let listener: StatusCallback = {
            let seen = seen.clone();
            Arc::new(move |connected: bool| {
                if connected {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        assert!(listeners.add(listener.clone()));
        assert!(!listeners.add(listener.clone()));
        assert_eq!(listeners.snapshot().len(), 1);

        let panicking: StatusCallback = Arc::new(|_: bool| panic!("listener bug"));
        listeners.add(panicking);
        notify_status(true, &listeners.snapshot());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        assert!(listeners.remove(&listener));
        assert!(!listeners.remove(&listener));
        assert_eq!(listeners.snapshot().len(), 1);
    }
}
