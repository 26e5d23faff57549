//! Event Bus for inter-module communication
//!
//! The EventBus provides a topic-based pub/sub pattern so app modules and the
//! orchestrator can communicate without tight coupling. Delivery is
//! synchronous: `emit` invokes, in registration order, every handler for the
//! topic and then every wildcard handler, before returning.
//!
//! There is no queueing, persistence or replay. A handler that panics is
//! contained and logged, and the remaining handlers still run.

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, error};

type TopicHandler = Arc<dyn Fn(&Value) + Send + Sync>;
type WildcardHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// An event observed on the bus
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
    /// Emitting app, taken from the payload's `source` field when present
    pub source_app: Option<String>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        let source_app = payload
            .get("source")
            .and_then(|s| s.as_str())
            .map(String::from);
        Self {
            topic: topic.into(),
            payload,
            source_app,
        }
    }
}

struct Listener<H> {
    id: u64,
    once: bool,
    handler: H,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    topics: HashMap<String, Vec<Listener<TopicHandler>>>,
    wildcard: Vec<Listener<WildcardHandler>>,
}

impl Listeners {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Snapshot the handlers for one emit, dropping `once` listeners so they
    /// cannot fire a second time.
    fn take_for(&mut self, topic: &str) -> (Vec<TopicHandler>, Vec<WildcardHandler>) {
        let topic_handlers = match self.topics.get_mut(topic) {
            Some(list) => snapshot(list),
            None => Vec::new(),
        };
        let wildcard_handlers = snapshot(&mut self.wildcard);
        (topic_handlers, wildcard_handlers)
    }
}

fn snapshot<H: Clone>(list: &mut Vec<Listener<H>>) -> Vec<H> {
    let handlers = list.iter().map(|l| l.handler.clone()).collect();
    list.retain(|l| !l.once);
    handlers
}

#[derive(Debug, Clone)]
enum Slot {
    Topic(String),
    Wildcard,
}

/// Handle returned by every subscription
///
/// Dropping the handle keeps the handler subscribed. Call `unsubscribe` to
/// remove it from future emits.
#[derive(Debug)]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    slot: Slot,
    id: u64,
}

impl Subscription {
    /// Remove the handler from future emits
    ///
    /// An emit that is already running keeps its snapshot and may still call
    /// the handler once.
    pub fn unsubscribe(self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut listeners = listeners.lock().unwrap_or_else(PoisonError::into_inner);
        match &self.slot {
            Slot::Topic(topic) => {
                if let Some(list) = listeners.topics.get_mut(topic) {
                    list.retain(|l| l.id != self.id);
                    if list.is_empty() {
                        listeners.topics.remove(topic);
                    }
                }
            }
            Slot::Wildcard => listeners.wildcard.retain(|l| l.id != self.id),
        }
    }
}

/// Event bus for synchronous pub/sub between components
#[derive(Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Listeners>>,
}

impl EventBus {
    /// Create a new EventBus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a specific topic
    pub fn on<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.add_topic_listener(topic.into(), Arc::new(handler), false)
    }

    /// Subscribe to a topic for a single delivery
    pub fn once<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.add_topic_listener(topic.into(), Arc::new(handler), true)
    }

    /// Subscribe to every topic
    ///
    /// Wildcard handlers receive the topic alongside the payload and run
    /// after the topic-specific handlers.
    pub fn on_any<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let mut listeners = self.lock();
        let id = listeners.next_id();
        listeners.wildcard.push(Listener {
            id,
            once: false,
            handler: Arc::new(handler),
        });
        self.subscription(Slot::Wildcard, id)
    }

    /// Publish an event to all subscribers
    ///
    /// The handler list is snapshotted before delivery, so handlers may
    /// subscribe or unsubscribe (even themselves) without deadlocking.
    pub fn emit(&self, topic: &str, payload: Value) {
        debug!(topic, "Emitting event");

        let (topic_handlers, wildcard_handlers) = self.lock().take_for(topic);

        for handler in topic_handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&payload))).is_err() {
                error!(topic, "Event handler panicked; continuing with remaining handlers");
            }
        }

        for handler in wildcard_handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(topic, &payload))).is_err() {
                error!(
                    topic,
                    "Wildcard handler panicked; continuing with remaining handlers"
                );
            }
        }
    }

    /// Number of handlers that would currently receive `topic`, wildcard
    /// handlers included
    pub fn listener_count(&self, topic: &str) -> usize {
        let listeners = self.lock();
        listeners.topics.get(topic).map_or(0, Vec::len) + listeners.wildcard.len()
    }

    fn add_topic_listener(&self, topic: String, handler: TopicHandler, once: bool) -> Subscription {
        let mut listeners = self.lock();
        let id = listeners.next_id();
        listeners
            .topics
            .entry(topic.clone())
            .or_default()
            .push(Listener { id, once, handler });
        self.subscription(Slot::Topic(topic), id)
    }

    fn subscription(&self, slot: Slot, id: u64) -> Subscription {
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            slot,
            id,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (
        Arc<Mutex<Vec<String>>>,
        impl Fn(&str) + Clone + Send + Sync + 'static,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let push = move |s: &str| sink.lock().unwrap().push(s.to_string());
        (seen, push)
    }

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        bus.on("calendar_event_created", move |payload| {
            sink.lock().unwrap().push(payload.clone());
        });

        bus.emit("calendar_event_created", json!({"title": "Standup"}));
        bus.emit("calendar_event_deleted", json!({"title": "Ignored"}));

        let received = received.lock().unwrap();
        assert_eq!(*received, vec![json!({"title": "Standup"})]);
    }

    #[test]
    fn test_topic_handlers_run_before_wildcard_in_registration_order() {
        let bus = EventBus::new();
        let (seen, push) = recorder();

        let p = push.clone();
        bus.on_any(move |topic, _| p(&format!("any:{}", topic)));
        let p = push.clone();
        bus.on("t", move |_| p("first"));
        let p = push.clone();
        bus.on("t", move |_| p("second"));

        bus.emit("t", json!({}));

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "any:t"]);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let bus = EventBus::new();
        let (seen, push) = recorder();
        bus.once("ping", move |_| push("pong"));

        bus.emit("ping", json!(null));
        bus.emit("ping", json!(null));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count("ping"), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (seen, push) = recorder();
        let sub = bus.on("tick", move |_| push("tick"));

        bus.emit("tick", json!(1));
        sub.unsubscribe();
        bus.emit("tick", json!(2));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let bus = EventBus::new();
        let (seen, push) = recorder();

        bus.on("boom", |_| panic!("handler failure"));
        let p = push.clone();
        bus.on("boom", move |_| p("survivor"));
        bus.on_any(move |_, _| push("wildcard"));

        bus.emit("boom", json!({}));
        bus.emit("boom", json!({}));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["survivor", "wildcard", "survivor", "wildcard"]
        );
    }

    #[test]
    fn test_event_source_app() {
        let event = Event::new("todo_task_overdue", json!({"source": "todo"}));
        assert_eq!(event.source_app.as_deref(), Some("todo"));
        assert!(Event::new("x", json!(42)).source_app.is_none());
    }
}
