//! Tests for the schedule tick loop.
//!
//! A due schedule fires exactly once and its next fire time advances
//! from the slot it was due at, not from the tick that noticed it; a
//! schedule that cannot run anymore is parked, never spun.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};

use super::{Scheduler, SchedulerConfig};
use crate::aggregator::Aggregator;
use crate::catalog::Catalog;
use crate::db::Database;
use crate::dispatch::DispatchQueue;
use crate::hub::EventHub;
use crate::models::{
    Frequency, Phase, Scenario, Schedule, ScheduleRunStatus, ScheduleStatus, Technique,
};
use crate::orchestrator::Orchestrator;
use crate::registry::Registry;

struct TestHarness {
    db: Arc<Database>,
    scheduler: Scheduler,
}

impl TestHarness {
    fn new() -> Self {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let registry = Arc::new(Registry::new(db.clone()));
        let dispatch = Arc::new(DispatchQueue::new());
        let catalog = Arc::new(Catalog::new(db.clone()));
        let hub = EventHub::new();
        let aggregator = Arc::new(Aggregator::new(db.clone(), hub.clone()));
        let orchestrator = Arc::new(Orchestrator::new(
            db.clone(),
            registry,
            dispatch,
            catalog,
            aggregator,
            hub,
            30,
        ));
        let scheduler = Scheduler::new(db.clone(), orchestrator, SchedulerConfig::default());

        TestHarness { db, scheduler }
    }

    fn seed_scenario(&self, id: &str) {
        let technique = Technique {
            id: "T1082".to_string(),
            name: "System Information Discovery".to_string(),
            tactic: "discovery".to_string(),
            executors: Vec::new(),
            is_safe: true,
            detection: None,
        };
        let _ = self.db.save_technique(&technique);

        let scenario = Scenario {
            id: id.to_string(),
            name: format!("scenario {}", id),
            description: String::new(),
            phases: vec![Phase {
                name: "main".to_string(),
                techniques: vec!["T1082".to_string()],
            }],
        };
        self.db.save_scenario(&scenario).expect("seed scenario");
    }

    fn seed_schedule(&self, schedule: &Schedule) {
        self.db.create_schedule(schedule).expect("seed schedule");
    }

    fn reload(&self, id: &str) -> Schedule {
        self.db
            .find_schedule(id)
            .expect("query")
            .expect("schedule exists")
    }
}

fn make_schedule(
    id: &str,
    scenario_id: &str,
    frequency: Frequency,
    next_run_at: Option<DateTime<Utc>>,
) -> Schedule {
    Schedule {
        id: id.to_string(),
        scenario_id: scenario_id.to_string(),
        agent_paw: None,
        frequency,
        cron_expr: None,
        safe_mode: true,
        status: ScheduleStatus::Active,
        next_run_at,
        last_run_at: None,
        last_run_id: None,
        created_at: Utc::now(),
    }
}

// ============================================================================
// Firing and cadence
// ============================================================================

#[tokio::test]
async fn due_schedule_fires_once_and_advances_from_its_slot() {
    let h = TestHarness::new();
    h.seed_scenario("scn-1");

    // Due one second ago; the slot itself was at `slot`.
    let now = Utc::now();
    let slot = now - Duration::seconds(1);
    h.seed_schedule(&make_schedule("sched-1", "scn-1", Frequency::Daily, Some(slot)));

    h.scheduler.tick(now);

    let executions = h.db.list_executions().expect("list");
    assert_eq!(executions.len(), 1, "the due schedule fires exactly once");

    let schedule = h.reload("sched-1");
    assert_eq!(
        schedule.next_run_at,
        Some(slot + Duration::days(1)),
        "the next slot is a day after the previous slot, not after the tick"
    );
    assert_eq!(schedule.last_run_id, Some(executions[0].id.clone()));
    assert!(schedule.last_run_at.is_some());

    let runs = h.db.list_schedule_runs("sched-1", 10).expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, ScheduleRunStatus::Completed);
    assert_eq!(runs[0].execution_id, Some(executions[0].id.clone()));

    // The very next tick finds nothing due.
    h.scheduler.tick(now);
    assert_eq!(h.db.list_executions().expect("list").len(), 1);
}

#[tokio::test]
async fn overdue_schedule_catches_up_past_now() {
    let h = TestHarness::new();
    h.seed_scenario("scn-1");

    let now = Utc::now();
    let slot = now - Duration::days(3) - Duration::hours(1);
    h.seed_schedule(&make_schedule("sched-1", "scn-1", Frequency::Daily, Some(slot)));

    h.scheduler.tick(now);

    let schedule = h.reload("sched-1");
    assert_eq!(
        schedule.next_run_at,
        Some(slot + Duration::days(4)),
        "the daily step repeats until the slot lands in the future"
    );
    assert_eq!(
        h.db.list_executions().expect("list").len(),
        1,
        "catching up runs the scenario once, not once per missed slot"
    );
}

#[tokio::test]
async fn paused_and_future_schedules_stay_quiet() {
    let h = TestHarness::new();
    h.seed_scenario("scn-1");

    let now = Utc::now();
    let mut paused = make_schedule(
        "sched-paused",
        "scn-1",
        Frequency::Hourly,
        Some(now - Duration::minutes(5)),
    );
    paused.status = ScheduleStatus::Paused;
    h.seed_schedule(&paused);
    h.seed_schedule(&make_schedule(
        "sched-later",
        "scn-1",
        Frequency::Hourly,
        Some(now + Duration::minutes(5)),
    ));

    h.scheduler.tick(now);

    assert!(h.db.list_executions().expect("list").is_empty());
    assert!(h.db.list_schedule_runs("sched-paused", 10).expect("runs").is_empty());
    assert!(h.db.list_schedule_runs("sched-later", 10).expect("runs").is_empty());
}

#[tokio::test]
async fn cron_schedule_falls_back_to_the_first_occurrence_after_now() {
    let h = TestHarness::new();
    h.seed_scenario("scn-1");

    // Daily at midnight, overdue by more than a week.
    let now = Utc::now();
    let mut schedule = make_schedule(
        "sched-cron",
        "scn-1",
        Frequency::Cron,
        Some(now - Duration::days(10)),
    );
    schedule.cron_expr = Some("0 0 * * *".to_string());
    h.seed_schedule(&schedule);

    h.scheduler.tick(now);

    assert_eq!(h.db.list_executions().expect("list").len(), 1);
    let schedule = h.reload("sched-cron");
    let next = schedule.next_run_at.expect("cron schedule stays live");
    assert!(next > now, "the next occurrence must be in the future");
    assert!(next <= now + Duration::days(1));
    assert_eq!((next.hour(), next.minute()), (0, 0));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn broken_cron_schedule_is_parked_not_spun() {
    let h = TestHarness::new();
    h.seed_scenario("scn-1");

    let now = Utc::now();
    let mut schedule = make_schedule(
        "sched-broken",
        "scn-1",
        Frequency::Cron,
        Some(now - Duration::minutes(1)),
    );
    schedule.cron_expr = Some("not a cron expression".to_string());
    h.seed_schedule(&schedule);

    h.scheduler.tick(now);

    let schedule = h.reload("sched-broken");
    assert_eq!(schedule.next_run_at, None, "a broken schedule is parked");
    assert!(h.db.list_executions().expect("list").is_empty());

    let runs = h.db.list_schedule_runs("sched-broken", 10).expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, ScheduleRunStatus::Failed);

    // Parked means the next tick does not touch it again.
    h.scheduler.tick(now + Duration::minutes(1));
    let runs = h.db.list_schedule_runs("sched-broken", 10).expect("runs");
    assert_eq!(runs.len(), 1, "no second failed run");
}

#[tokio::test]
async fn missing_scenario_records_the_failure_and_keeps_ticking() {
    let h = TestHarness::new();

    let now = Utc::now();
    let slot = now - Duration::minutes(1);
    h.seed_schedule(&make_schedule(
        "sched-1",
        "ghost-scenario",
        Frequency::Hourly,
        Some(slot),
    ));

    h.scheduler.tick(now);

    assert!(h.db.list_executions().expect("list").is_empty());

    let runs = h.db.list_schedule_runs("sched-1", 10).expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, ScheduleRunStatus::Failed);
    assert!(
        runs[0]
            .error
            .as_deref()
            .unwrap_or("")
            .contains("not found"),
        "the trigger error lands on the run: {:?}",
        runs[0].error
    );

    let schedule = h.reload("sched-1");
    assert_eq!(
        schedule.next_run_at,
        Some(slot + Duration::hours(1)),
        "a failing schedule still advances"
    );
}
