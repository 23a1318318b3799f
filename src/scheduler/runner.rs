//! Schedule tick loop.
//!
//! A periodic poll picks up active schedules whose `next_run_at` is due
//! and starts an execution for each through the orchestrator. The next
//! fire time advances from the previous scheduled instant, never from
//! the wall clock, so the cadence holds even when a tick lands late.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::time::{Duration as TokioDuration, interval};
use uuid::Uuid;

use crate::db::Database;
use crate::models::{Frequency, Schedule, ScheduleRun, ScheduleRunStatus};
use crate::orchestrator::Orchestrator;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Poll interval in seconds for checking due schedules
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            poll_interval_secs: 5,
        }
    }
}

/// The scheduler service that turns wall-clock time into executions
pub struct Scheduler {
    db: Arc<Database>,
    orchestrator: Arc<Orchestrator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(db: Arc<Database>, orchestrator: Arc<Orchestrator>, config: SchedulerConfig) -> Self {
        Scheduler {
            db,
            orchestrator,
            config,
        }
    }

    /// Start the scheduler background task
    pub async fn start(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) {
        log::info!(
            "Scheduler started (poll: {}s)",
            self.config.poll_interval_secs
        );

        let mut poll_interval = interval(TokioDuration::from_secs(self.config.poll_interval_secs));

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    log::info!("Scheduler received shutdown signal");
                    break;
                }
                _ = poll_interval.tick() => {
                    self.tick(Utc::now());
                }
            }
        }

        log::info!("Scheduler stopped");
    }

    /// Process one tick: fire every schedule that has come due.
    pub fn tick(&self, now: DateTime<Utc>) {
        let due = match self.db.list_due_schedules(now) {
            Ok(due) => due,
            Err(e) => {
                log::error!("Failed to list due schedules: {}", e);
                return;
            }
        };

        for schedule in due {
            let id = schedule.id.clone();
            if let Err(e) = self.trigger(schedule, now) {
                log::error!("Schedule {} trigger failed: {}", id, e);
            }
        }
    }

    /// Fire one due schedule. The trigger outcome, good or bad, lands in
    /// a ScheduleRun row; only storage failures bubble up.
    fn trigger(&self, mut schedule: Schedule, now: DateTime<Utc>) -> Result<(), String> {
        // next_run_at moves forward before anything runs; a slow start
        // must not leave the schedule due for the following tick.
        let from = schedule.next_run_at.unwrap_or(now);
        schedule.next_run_at = advance(&schedule, from, now);

        if schedule.next_run_at.is_none() {
            // The cron expression stopped producing occurrences. Park the
            // schedule instead of spinning on it every tick.
            let message = format!(
                "schedule {} cannot compute its next run from {:?}",
                schedule.id, schedule.cron_expr
            );
            log::error!("{}", message);
            self.db
                .update_schedule(&schedule)
                .map_err(|e| format!("parking schedule: {}", e))?;
            self.record_run(&schedule.id, None, Some(&message), now)?;
            return Ok(());
        }

        self.db
            .update_schedule(&schedule)
            .map_err(|e| format!("advancing schedule: {}", e))?;

        let targets: Vec<String> = schedule.agent_paw.iter().cloned().collect();
        match self
            .orchestrator
            .start_execution(&schedule.scenario_id, &targets, schedule.safe_mode)
        {
            Ok(execution) => {
                log::info!(
                    "Schedule {} started execution {} of scenario {}",
                    schedule.id,
                    execution.id,
                    schedule.scenario_id
                );
                schedule.last_run_at = Some(now);
                schedule.last_run_id = Some(execution.id.clone());
                self.db
                    .update_schedule(&schedule)
                    .map_err(|e| format!("recording last run: {}", e))?;
                self.record_run(&schedule.id, Some(&execution.id), None, now)?;
            }
            Err(e) => {
                log::error!("Schedule {} failed to start: {}", schedule.id, e);
                schedule.last_run_at = Some(now);
                self.db
                    .update_schedule(&schedule)
                    .map_err(|e| format!("recording failed run: {}", e))?;
                self.record_run(&schedule.id, None, Some(&e), now)?;
            }
        }

        Ok(())
    }

    fn record_run(
        &self,
        schedule_id: &str,
        execution_id: Option<&str>,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let run = ScheduleRun {
            id: Uuid::new_v4().to_string(),
            schedule_id: schedule_id.to_string(),
            execution_id: execution_id.map(|s| s.to_string()),
            status: if error.is_none() {
                ScheduleRunStatus::Completed
            } else {
                ScheduleRunStatus::Failed
            },
            error: error.map(|s| s.to_string()),
            created_at: now,
        };
        self.db
            .create_schedule_run(&run)
            .map_err(|e| format!("recording schedule run: {}", e))
    }
}

/// Next fire time for a schedule that was due at `from`.
///
/// Fixed frequencies step from the previous scheduled instant, repeating
/// the step until the result lands in the future; an overdue cron
/// schedule falls back to its first occurrence after `now`.
fn advance(schedule: &Schedule, from: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if schedule.frequency == Frequency::Cron {
        return schedule.next_run_after(now);
    }

    let mut next = schedule.next_run_after(from)?;
    while next <= now {
        next = schedule.next_run_after(next)?;
    }
    Some(next)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod runner_tests;
