//! Tests for hub fan-out, ordering, and slow-subscriber eviction.
//!
//! The hub must deliver events in send order, never block a producer,
//! and evict a subscriber whose buffer is full while leaving the rest
//! untouched.

use tokio::time::{Duration, timeout};

use super::{Event, EventHub, SUBSCRIBER_BUFFER};

async fn drain(rx: &mut tokio::sync::mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match timeout(Duration::from_millis(50), rx.recv()).await {
            Ok(Some(event)) => events.push(event),
            _ => break,
        }
    }
    events
}

#[tokio::test]
async fn subscriber_receives_events_in_send_order() {
    let hub = EventHub::new();
    let (_id, mut rx) = hub.subscribe().await.expect("subscribe");

    hub.publish(Event::error("first"));
    hub.publish(Event::error("second"));
    hub.publish(Event::error("third"));

    let events = drain(&mut rx).await;
    let messages: Vec<&str> = events
        .iter()
        .map(|e| e.payload["message"].as_str().unwrap_or(""))
        .collect();
    assert_eq!(messages, vec!["first", "second", "third"], "send order must be preserved");

    for event in &events {
        assert_eq!(event.event_type, "error");
        assert!(
            chrono::DateTime::parse_from_rfc3339(&event.timestamp).is_ok(),
            "timestamp must be RFC 3339: {}",
            event.timestamp
        );
    }
}

#[tokio::test]
async fn unsubscribed_observer_gets_nothing_further() {
    let hub = EventHub::new();
    let (id, mut rx) = hub.subscribe().await.expect("subscribe");

    hub.unsubscribe(&id).await;
    hub.publish(Event::error("after unsubscribe"));

    // Removal drops the hub-side sender, so the receiver terminates
    // instead of yielding the event.
    let outcome = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(
        matches!(outcome, Ok(None)),
        "receiver should close without delivering, got {:?}",
        outcome.map(|o| o.map(|e| e.event_type))
    );
}

#[tokio::test]
async fn full_subscriber_is_evicted_without_disturbing_others() {
    let hub = EventHub::new();
    let (_slow_id, mut slow_rx) = hub.subscribe().await.expect("subscribe slow");
    let (_live_id, mut live_rx) = hub.subscribe().await.expect("subscribe live");

    // Fill every buffer exactly; the slow subscriber never drains.
    for i in 0..SUBSCRIBER_BUFFER {
        hub.publish(Event::error(&format!("fill {}", i)));
    }

    let drained = drain(&mut live_rx).await;
    assert_eq!(drained.len(), SUBSCRIBER_BUFFER, "live subscriber keeps up");

    // One more event overflows the slow subscriber's buffer.
    hub.publish(Event::error("overflow"));

    let event = timeout(Duration::from_millis(200), live_rx.recv())
        .await
        .expect("event within timeout")
        .expect("live channel stays open");
    assert_eq!(event.payload["message"], "overflow");

    assert_eq!(
        hub.subscriber_count().await,
        1,
        "the overflowing subscriber must be removed from the set"
    );

    // The evicted subscriber keeps its buffered backlog, then closes; the
    // overflow event is never delivered to it.
    let mut backlog = 0;
    while let Some(event) = slow_rx.recv().await {
        assert_ne!(event.payload["message"], "overflow");
        backlog += 1;
    }
    assert_eq!(backlog, SUBSCRIBER_BUFFER);
}

#[tokio::test]
async fn publish_with_no_subscribers_is_harmless() {
    let hub = EventHub::new();
    hub.publish(Event::error("into the void"));
    assert_eq!(hub.subscriber_count().await, 0);
}

#[test]
fn event_envelope_serializes_with_type_field() {
    let event = Event::agent_disconnected("paw-9");
    let value = serde_json::to_value(&event).expect("serialize");

    assert_eq!(value["type"], "agent_disconnected");
    assert_eq!(value["payload"]["paw"], "paw-9");
    assert!(value["timestamp"].is_string());

    let back: Event = serde_json::from_value(value).expect("deserialize");
    assert_eq!(back.event_type, "agent_disconnected");
}
