//! Tests for the beacon exchange.
//!
//! Validation must reject bad payloads before anything mutates, first
//! contact assigns a paw, results settle exactly once, and queued work
//! rides back on the response with a jittered delay.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Duration, timeout};
use uuid::Uuid;

use super::{BeaconConfig, BeaconError, BeaconService};
use crate::aggregator::Aggregator;
use crate::db::Database;
use crate::dispatch::DispatchQueue;
use crate::hub::{Event, EventHub};
use crate::models::{
    BeaconRequest, BeaconResult, Execution, ExecutionResult, ExecutionStatus, PlannedTask,
    ResultStatus,
};
use crate::registry::Registry;

const INTERVAL: u64 = 30;
const JITTER: u64 = 5;

struct TestHarness {
    db: Arc<Database>,
    registry: Arc<Registry>,
    dispatch: Arc<DispatchQueue>,
    hub: EventHub,
    service: BeaconService,
}

impl TestHarness {
    fn new() -> Self {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let registry = Arc::new(Registry::new(db.clone()));
        let dispatch = Arc::new(DispatchQueue::new());
        let hub = EventHub::new();
        let aggregator = Arc::new(Aggregator::new(db.clone(), hub.clone()));
        let service = BeaconService::new(
            registry.clone(),
            dispatch.clone(),
            aggregator,
            hub.clone(),
            BeaconConfig {
                interval_secs: INTERVAL,
                jitter_secs: JITTER,
            },
        );

        TestHarness {
            db,
            registry,
            dispatch,
            hub,
            service,
        }
    }

    /// A running execution, its pending row, and the queued task, laid
    /// out the way the orchestrator leaves them.
    fn seed_task(&self, task_id: &str, execution_id: &str, paw: &str) {
        let now = Utc::now();
        let execution = Execution {
            id: execution_id.to_string(),
            scenario_id: "scn-1".to_string(),
            status: ExecutionStatus::Running,
            safe_mode: true,
            score: None,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
        };
        let _ = self.db.create_execution(&execution);

        let row = ExecutionResult {
            id: task_id.to_string(),
            execution_id: execution_id.to_string(),
            technique_id: "T1082".to_string(),
            agent_paw: paw.to_string(),
            status: ResultStatus::Pending,
            output: None,
            exit_code: None,
            detected_by: None,
            created_at: now,
            updated_at: now,
        };
        self.db.create_result(&row).expect("seed row");

        self.dispatch.enqueue(vec![PlannedTask {
            id: task_id.to_string(),
            execution_id: execution_id.to_string(),
            technique_id: "T1082".to_string(),
            agent_paw: paw.to_string(),
            executor_kind: "bash".to_string(),
            executor_name: "bash-variant".to_string(),
            phase: "main".to_string(),
            sequence: 0,
            command: "uname -a".to_string(),
            timeout_secs: 60,
        }]);
    }
}

fn beacon(paw: &str, results: Vec<BeaconResult>) -> BeaconRequest {
    BeaconRequest {
        paw: paw.to_string(),
        hostname: "host-1".to_string(),
        platform: "linux".to_string(),
        executors: vec!["bash".to_string()],
        metadata: serde_json::json!({"user": "svc"}),
        results,
    }
}

fn submitted(task_id: &str, status: &str) -> BeaconResult {
    BeaconResult {
        task_id: task_id.to_string(),
        status: status.to_string(),
        output: Some("ok".to_string()),
        exit_code: Some(0),
    }
}

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

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn first_contact_assigns_a_paw_and_announces_it() {
    let h = TestHarness::new();
    let (_id, mut rx) = h.hub.subscribe().await.expect("subscribe");

    let response = h.service.handle(beacon("", vec![])).expect("beacon");
    assert!(!response.paw.is_empty());
    assert!(
        Uuid::parse_str(&response.paw).is_ok(),
        "assigned paws are uuids, got {}",
        response.paw
    );
    assert!(response.tasks.is_empty());

    let agent = h.registry.find(&response.paw).expect("registered");
    assert_eq!(agent.hostname, "host-1");

    let events = drain(&mut rx).await;
    assert!(events.iter().any(|e| e.event_type == "agent_connected"));
}

#[tokio::test]
async fn a_known_paw_is_confirmed_not_replaced() {
    let h = TestHarness::new();
    let first = h.service.handle(beacon("", vec![])).expect("first contact");

    let (_id, mut rx) = h.hub.subscribe().await.expect("subscribe");
    let second = h
        .service
        .handle(beacon(&first.paw, vec![]))
        .expect("second contact");
    assert_eq!(second.paw, first.paw);

    let events = drain(&mut rx).await;
    assert!(
        events.iter().all(|e| e.event_type != "agent_connected"),
        "an agent already online must not re-announce"
    );
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn malformed_payloads_are_rejected_before_any_mutation() {
    let h = TestHarness::new();
    h.seed_task("task-1", "exec-1", "paw-1");

    // Identity is fine; the second result carries a status the server
    // never accepts. The whole payload must bounce untouched.
    let request = beacon(
        "paw-1",
        vec![
            submitted("task-1", "success"),
            submitted("task-2", "exploded"),
        ],
    );
    let err = h.service.handle(request).expect_err("must reject");
    assert!(matches!(err, BeaconError::Invalid(_)), "got {:?}", err);

    assert!(
        h.registry.find("paw-1").is_none(),
        "no upsert before validation passes"
    );
    let row = h.db.find_result("task-1").expect("query").expect("row");
    assert_eq!(
        row.status,
        ResultStatus::Pending,
        "no result settles either"
    );

    let err = h
        .service
        .handle(BeaconRequest {
            hostname: String::new(),
            ..beacon("paw-1", vec![])
        })
        .expect_err("empty hostname");
    assert!(matches!(err, BeaconError::Invalid(_)));

    let err = h
        .service
        .handle(BeaconRequest {
            platform: "  ".to_string(),
            ..beacon("paw-1", vec![])
        })
        .expect_err("blank platform");
    assert!(matches!(err, BeaconError::Invalid(_)));

    let err = h
        .service
        .handle(beacon("paw-1", vec![submitted("", "success")]))
        .expect_err("blank task id");
    assert!(matches!(err, BeaconError::Invalid(_)));
}

#[tokio::test]
async fn server_side_statuses_cannot_be_submitted() {
    let h = TestHarness::new();
    for status in ["pending", "skipped"] {
        let err = h
            .service
            .handle(beacon("paw-1", vec![submitted("task-1", status)]))
            .expect_err("must reject");
        assert!(
            matches!(err, BeaconError::Invalid(_)),
            "{} slipped through as {:?}",
            status,
            err
        );
    }
}

// ============================================================================
// Result settlement and task hand-off
// ============================================================================

#[tokio::test]
async fn results_settle_once_and_queued_work_rides_back() {
    let h = TestHarness::new();
    h.seed_task("task-1", "exec-1", "paw-1");

    // First contact picks the task up.
    let response = h.service.handle(beacon("paw-1", vec![])).expect("pickup");
    assert_eq!(response.tasks.len(), 1);
    assert_eq!(response.tasks[0].task_id, "task-1");
    assert_eq!(response.tasks[0].command, "uname -a");
    assert_eq!(h.dispatch.dispatched_count(), 1);

    // Next contact returns the outcome.
    let response = h
        .service
        .handle(beacon("paw-1", vec![submitted("task-1", "blocked")]))
        .expect("submit");
    assert!(response.tasks.is_empty(), "nothing further is queued");
    assert_eq!(
        h.dispatch.dispatched_count(),
        0,
        "completion clears in-flight tracking"
    );

    let row = h.db.find_result("task-1").expect("query").expect("row");
    assert_eq!(row.status, ResultStatus::Blocked);

    // Replaying the task id is accepted and changes nothing.
    let replay = h
        .service
        .handle(beacon("paw-1", vec![submitted("task-1", "success")]))
        .expect("replay accepted");
    assert!(replay.tasks.is_empty());
    let row = h.db.find_result("task-1").expect("query").expect("row");
    assert_eq!(row.status, ResultStatus::Blocked, "the first outcome stands");
}

#[tokio::test]
async fn unknown_task_ids_are_accepted_and_ignored() {
    let h = TestHarness::new();
    let response = h
        .service
        .handle(beacon("paw-1", vec![submitted("ghost", "success")]))
        .expect("beacon");
    assert!(response.tasks.is_empty());
    assert!(h.db.find_result("ghost").expect("query").is_none());
}

// ============================================================================
// Contact cadence
// ============================================================================

#[tokio::test]
async fn sleep_stays_within_the_jitter_band() {
    let h = TestHarness::new();
    for _ in 0..50 {
        let response = h.service.handle(beacon("paw-1", vec![])).expect("beacon");
        assert!(
            (INTERVAL..=INTERVAL + JITTER).contains(&response.sleep),
            "sleep {} outside [{}, {}]",
            response.sleep,
            INTERVAL,
            INTERVAL + JITTER
        );
    }
}
