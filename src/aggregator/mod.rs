//! Result aggregation and security scoring.
//!
//! Every task outcome, whether submitted by an agent or retired by a
//! sweep, funnels through [`Aggregator`]: it settles the result row,
//! stamps detection metadata, refreshes the execution's running score
//! and finishes the execution once every row is terminal. Scoring
//! itself is a pure fold over result rows so it can be recomputed from
//! storage at any time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use rusqlite::Result as SqliteResult;

use crate::db::Database;
use crate::hub::{Event, EventHub};
use crate::models::{ExecutionResult, ExecutionStatus, ResultStatus, SecurityScore};

/// Executions inspected when computing catalog coverage.
const COVERAGE_WINDOW: u32 = 20;

/// Fold result rows into a [`SecurityScore`].
///
/// Each technique is scored once, on its worst outcome across agents:
/// a technique that ran undefended anywhere counts as successful even
/// if another host blocked it. Pending and skipped rows carry no signal
/// and stay out of the totals; failed attempts count toward the total
/// but earn nothing.
pub fn compute_score(
    results: &[ExecutionResult],
    tactics: &HashMap<String, String>,
) -> SecurityScore {
    let mut worst: HashMap<&str, ResultStatus> = HashMap::new();
    for result in results {
        if result.status.severity() == 0 {
            continue;
        }
        let entry = worst
            .entry(result.technique_id.as_str())
            .or_insert(result.status);
        if result.status.severity() > entry.severity() {
            *entry = result.status;
        }
    }

    let mut score = SecurityScore::empty();
    let mut tactic_tallies: HashMap<String, Tally> = HashMap::new();

    for (technique_id, status) in &worst {
        score.total += 1;
        let tactic = tactics
            .get(*technique_id)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let tally = tactic_tallies.entry(tactic).or_default();
        tally.total += 1;

        match status {
            ResultStatus::Blocked => {
                score.blocked += 1;
                tally.blocked += 1;
            }
            ResultStatus::Detected => {
                score.detected += 1;
                tally.detected += 1;
            }
            ResultStatus::Success => score.successful += 1,
            _ => {}
        }
    }

    score.overall = weighted_ratio(score.blocked, score.detected, score.total);
    for (tactic, tally) in tactic_tallies {
        score.by_tactic.insert(
            tactic,
            weighted_ratio(tally.blocked, tally.detected, tally.total),
        );
    }

    score
}

#[derive(Default)]
struct Tally {
    blocked: u32,
    detected: u32,
    total: u32,
}

/// `(blocked * 100 + detected * 50) / (total * 100) * 100`, clamped to
/// `[0, 100]`. An empty total scores 0 rather than dividing by zero.
fn weighted_ratio(blocked: u32, detected: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let earned = (blocked * 100 + detected * 50) as f64;
    (earned / (total * 100) as f64 * 100.0).clamp(0.0, 100.0)
}

/// Applies task outcomes to storage and keeps execution scores current.
pub struct Aggregator {
    db: Arc<Database>,
    hub: EventHub,
}

impl Aggregator {
    pub fn new(db: Arc<Database>, hub: EventHub) -> Self {
        Self { db, hub }
    }

    /// Settle a submitted result.
    ///
    /// Unknown task ids and replays of already settled rows are taken in
    /// stride; the return value says whether this call changed anything.
    pub fn record_result(
        &self,
        task_id: &str,
        status: ResultStatus,
        output: Option<&str>,
        exit_code: Option<i32>,
    ) -> SqliteResult<bool> {
        let Some(row) = self.db.find_result(task_id)? else {
            return Ok(false);
        };

        let detected_by = if status == ResultStatus::Detected {
            self.db
                .find_technique(&row.technique_id)?
                .and_then(|t| t.detection)
        } else {
            None
        };

        let changed =
            self.db
                .resolve_result(task_id, status, output, exit_code, detected_by.as_deref())?;
        if !changed {
            return Ok(false);
        }

        if let Some(updated) = self.db.find_result(task_id)? {
            self.hub.publish(Event::technique_completed(&updated));
        }
        self.refresh_execution(&row.execution_id)?;

        Ok(true)
    }

    /// Retire a task that will never produce a result (agent offline,
    /// dispatch timeout, cancelled execution).
    pub fn skip_task(&self, task_id: &str) -> SqliteResult<bool> {
        let Some(row) = self.db.find_result(task_id)? else {
            return Ok(false);
        };

        let changed = self
            .db
            .resolve_result(task_id, ResultStatus::Skipped, None, None, None)?;
        if !changed {
            return Ok(false);
        }

        if let Some(updated) = self.db.find_result(task_id)? {
            self.hub.publish(Event::technique_completed(&updated));
        }
        self.refresh_execution(&row.execution_id)?;

        Ok(true)
    }

    /// Score an execution fresh from its rows, including mid-run.
    pub fn score_for(&self, execution_id: &str) -> SqliteResult<SecurityScore> {
        let results = self.db.list_results_by_execution(execution_id)?;
        let tactics = self.tactic_map()?;
        Ok(compute_score(&results, &tactics))
    }

    /// Change in overall score between the two most recent completed
    /// executions of a scenario. Zero when there is nothing to compare
    /// against.
    pub fn trend(&self, scenario_id: &str) -> SqliteResult<f64> {
        let executions = self.db.list_executions_by_scenario(scenario_id)?;
        let mut completed = executions
            .into_iter()
            .filter(|e| e.status == ExecutionStatus::Completed);

        let current = match completed.next().and_then(|e| e.score) {
            Some(score) => score.overall,
            None => return Ok(0.0),
        };
        let previous = match completed.next().and_then(|e| e.score) {
            Some(score) => score.overall,
            None => return Ok(0.0),
        };
        if previous == 0.0 {
            return Ok(0.0);
        }

        Ok(current - previous)
    }

    /// Share of the technique catalog exercised by recent executions,
    /// as a percentage. Skipped rows never ran, so they do not count.
    pub fn coverage(&self) -> SqliteResult<f64> {
        let total = self.db.count_techniques()?;
        if total == 0 {
            return Ok(0.0);
        }

        let mut exercised: HashSet<String> = HashSet::new();
        for execution in self.db.list_recent_executions(COVERAGE_WINDOW)? {
            for result in self.db.list_results_by_execution(&execution.id)? {
                if result.status != ResultStatus::Skipped {
                    exercised.insert(result.technique_id);
                }
            }
        }

        Ok(exercised.len() as f64 / total as f64 * 100.0)
    }

    /// Recompute the execution's score from its rows, and finish the
    /// execution when nothing is left outstanding.
    fn refresh_execution(&self, execution_id: &str) -> SqliteResult<()> {
        let Some(execution) = self.db.find_execution(execution_id)? else {
            return Ok(());
        };
        if execution.status != ExecutionStatus::Running {
            return Ok(());
        }

        let results = self.db.list_results_by_execution(execution_id)?;
        let tactics = self.tactic_map()?;
        let score = compute_score(&results, &tactics);

        let settled = results.iter().all(|r| r.status.is_terminal());
        if !settled {
            self.db.update_execution_score(execution_id, &score)?;
            return Ok(());
        }

        // The status guard arbitrates between concurrent finalizers;
        // whoever flips the row owns the completion event.
        let finished = self.db.finalize_execution(
            execution_id,
            ExecutionStatus::Completed,
            Some(&score),
            Utc::now(),
        )?;
        if finished {
            if let Some(completed) = self.db.find_execution(execution_id)? {
                log::info!(
                    "Execution {} completed with overall score {:.1}",
                    completed.id,
                    score.overall
                );
                self.hub.publish(Event::execution_completed(&completed));
            }
        }

        Ok(())
    }

    fn tactic_map(&self) -> SqliteResult<HashMap<String, String>> {
        let techniques = self.db.list_techniques()?;
        Ok(techniques.into_iter().map(|t| (t.id, t.tactic)).collect())
    }
}
