//! Tests for the dispatch queue's task lifecycle.
//!
//! Queued tasks must come out in plan order for exactly the agent they
//! were assigned to, move to dispatched on hand-out, and fall out again
//! on completion, cancellation, or timeout.

use chrono::{Duration, Utc};

use super::DispatchQueue;
use crate::models::PlannedTask;

fn task(id: &str, execution_id: &str, paw: &str, sequence: u32, timeout_secs: u32) -> PlannedTask {
    PlannedTask {
        id: id.to_string(),
        execution_id: execution_id.to_string(),
        technique_id: format!("T-{}", sequence),
        agent_paw: paw.to_string(),
        executor_kind: "bash".to_string(),
        executor_name: "bash-variant".to_string(),
        phase: "recon".to_string(),
        sequence,
        command: "whoami".to_string(),
        timeout_secs,
    }
}

#[test]
fn take_returns_tasks_in_plan_order_per_agent() {
    let queue = DispatchQueue::new();
    queue.enqueue(vec![
        task("t1", "e1", "alpha", 0, 60),
        task("t2", "e1", "beta", 1, 60),
        task("t3", "e1", "alpha", 2, 60),
    ]);

    let now = Utc::now();
    let handed = queue.take_for_agent("alpha", now);
    let ids: Vec<&str> = handed.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t3"], "alpha gets its own tasks in sequence order");

    assert_eq!(queue.queued_count(), 1, "beta's task stays queued");
    assert_eq!(queue.dispatched_count(), 2);

    let again = queue.take_for_agent("alpha", now);
    assert!(again.is_empty(), "a second take must not re-hand the same tasks");
}

#[test]
fn take_for_unknown_agent_is_empty() {
    let queue = DispatchQueue::new();
    assert!(queue.take_for_agent("ghost", Utc::now()).is_empty());
}

#[test]
fn complete_clears_dispatched_and_queued_entries() {
    let queue = DispatchQueue::new();
    queue.enqueue(vec![task("t1", "e1", "alpha", 0, 60), task("t2", "e1", "alpha", 1, 60)]);

    queue.take_for_agent("alpha", Utc::now());
    queue.complete("t1");
    assert_eq!(queue.dispatched_count(), 1);

    // Completing an id the queue never saw is a no-op.
    queue.complete("t1");
    queue.complete("unknown");
    assert_eq!(queue.dispatched_count(), 1);
}

#[test]
fn remove_execution_empties_both_sides() {
    let queue = DispatchQueue::new();
    queue.enqueue(vec![
        task("t1", "e1", "alpha", 0, 60),
        task("t2", "e1", "beta", 1, 60),
        task("t3", "e2", "alpha", 0, 60),
    ]);
    queue.take_for_agent("alpha", Utc::now());

    let removed = queue.remove_execution("e1");
    let mut ids: Vec<&str> = removed.iter().map(|t| t.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["t1", "t2"], "queued and dispatched e1 tasks both come out");

    assert!(queue.is_tracked("t3"), "other executions are untouched");
    assert!(!queue.is_tracked("t1"));
    assert!(!queue.is_tracked("t2"));
}

#[test]
fn remove_agent_queued_leaves_dispatched_alone() {
    let queue = DispatchQueue::new();
    queue.enqueue(vec![task("t1", "e1", "alpha", 0, 60)]);
    queue.take_for_agent("alpha", Utc::now());
    queue.enqueue(vec![task("t2", "e1", "alpha", 1, 60)]);

    let removed = queue.remove_agent_queued("alpha");
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, "t2", "only the undispatched task is retired");
    assert!(queue.is_tracked("t1"), "the in-flight task waits for the timeout sweep");
}

#[test]
fn sweep_retires_only_overdue_tasks() {
    let queue = DispatchQueue::new();
    queue.enqueue(vec![
        task("quick", "e1", "alpha", 0, 30),
        task("slow", "e1", "alpha", 1, 600),
    ]);

    let dispatched_at = Utc::now() - Duration::seconds(120);
    queue.take_for_agent("alpha", dispatched_at);

    // 120s since dispatch: past 30s+grace for "quick", within 600s for "slow".
    let removed = queue.sweep_timeouts(Utc::now(), Duration::seconds(30));
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, "quick");
    assert!(queue.is_tracked("slow"));

    let removed = queue.sweep_timeouts(Utc::now(), Duration::seconds(30));
    assert!(removed.is_empty(), "a swept task must not be reported twice");
}

#[test]
fn counts_reflect_lifecycle() {
    let queue = DispatchQueue::new();
    assert_eq!(queue.queued_count(), 0);
    assert_eq!(queue.dispatched_count(), 0);

    queue.enqueue(vec![task("t1", "e1", "alpha", 0, 60)]);
    assert_eq!(queue.queued_count(), 1);

    queue.take_for_agent("alpha", Utc::now());
    assert_eq!(queue.queued_count(), 0);
    assert_eq!(queue.dispatched_count(), 1);

    queue.complete("t1");
    assert_eq!(queue.dispatched_count(), 0);
}
