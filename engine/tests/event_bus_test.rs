//! Integration tests for the event bus
//!
//! Covers delivery order, wildcard fan-out, once-listeners, unsubscribe
//! during an emit, and panic containment.

use aware_engine::event_bus::EventBus;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Seen = Arc<Mutex<Vec<String>>>;

fn seen() -> Seen {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(seen: &Seen, entry: impl Into<String>) {
    seen.lock().unwrap().push(entry.into());
}

#[test]
fn test_topic_handlers_run_before_wildcards_in_registration_order() {
    let bus = EventBus::new();
    let log = seen();

    let l = log.clone();
    bus.on_any(move |topic, _| push(&l, format!("any1:{}", topic)));
    let l = log.clone();
    bus.on("calendar_event_created", move |_| push(&l, "topic1"));
    let l = log.clone();
    bus.on_any(move |topic, _| push(&l, format!("any2:{}", topic)));
    let l = log.clone();
    bus.on("calendar_event_created", move |_| push(&l, "topic2"));

    bus.emit("calendar_event_created", json!({}));

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "topic1",
            "topic2",
            "any1:calendar_event_created",
            "any2:calendar_event_created"
        ]
    );
}

#[test]
fn test_handlers_receive_exact_payload() {
    let bus = EventBus::new();
    let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

    let r = received.clone();
    bus.on("todo_task_overdue", move |payload| {
        r.lock().unwrap().push(payload.clone())
    });

    let payload = json!({"task": "taxes", "source": "todo", "nested": {"n": [1, 2]}});
    bus.emit("todo_task_overdue", payload.clone());
    bus.emit("other_topic", json!({"ignored": true}));

    assert_eq!(*received.lock().unwrap(), vec![payload]);
}

#[test]
fn test_once_fires_a_single_time() {
    let bus = EventBus::new();
    let log = seen();

    let l = log.clone();
    bus.once("weather_precipitation_expected", move |_| push(&l, "once"));

    bus.emit("weather_precipitation_expected", json!({}));
    bus.emit("weather_precipitation_expected", json!({}));

    assert_eq!(*log.lock().unwrap(), vec!["once"]);
    assert_eq!(bus.listener_count("weather_precipitation_expected"), 0);
}

#[test]
fn test_unsubscribe_stops_future_delivery() {
    let bus = EventBus::new();
    let log = seen();

    let l = log.clone();
    let subscription = bus.on("message_received", move |_| push(&l, "hit"));

    bus.emit("message_received", json!({}));
    subscription.unsubscribe();
    bus.emit("message_received", json!({}));

    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_unsubscribe_during_emit_keeps_in_progress_delivery() {
    let bus = Arc::new(EventBus::new());
    let log = seen();

    // First handler removes the second one mid-emit.
    let victim: Arc<Mutex<Option<aware_engine::event_bus::Subscription>>> =
        Arc::new(Mutex::new(None));

    let v = victim.clone();
    bus.on("tick", move |_| {
        if let Some(subscription) = v.lock().unwrap().take() {
            subscription.unsubscribe();
        }
    });
    let l = log.clone();
    *victim.lock().unwrap() = Some(bus.on("tick", move |_| push(&l, "second")));

    bus.emit("tick", json!({}));
    bus.emit("tick", json!({}));

    assert_eq!(*log.lock().unwrap(), vec!["second"]);
}

#[test]
fn test_panicking_handler_does_not_stop_others() {
    let bus = EventBus::new();
    let log = seen();

    bus.on("tick", |_| panic!("faulty handler"));
    let l = log.clone();
    bus.on("tick", move |_| push(&l, "after"));
    let l = log.clone();
    bus.on_any(move |_, _| push(&l, "wildcard"));

    bus.emit("tick", json!({}));
    bus.emit("tick", json!({}));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["after", "wildcard", "after", "wildcard"]
    );
}

#[test]
fn test_handler_may_emit_reentrantly() {
    let bus = Arc::new(EventBus::new());
    let log = seen();

    let inner = bus.clone();
    bus.on("outer", move |_| inner.emit("inner", json!({})));
    let l = log.clone();
    bus.on("inner", move |_| push(&l, "inner"));

    bus.emit("outer", json!({}));

    assert_eq!(*log.lock().unwrap(), vec!["inner"]);
}
