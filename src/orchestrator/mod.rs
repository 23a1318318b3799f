//! Execution lifecycle orchestration.
//!
//! Glues the planner's output to storage, the dispatch queue, the
//! aggregator and the event hub: starting runs, cancelling them, and
//! sweeping up after agents that stop beaconing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::catalog::Catalog;
use crate::db::Database;
use crate::dispatch::DispatchQueue;
use crate::hub::{Event, EventHub};
use crate::models::{
    Agent, AgentStatus, Execution, ExecutionResult, ExecutionStatus, Plan, ResultStatus,
    SecurityScore, Technique,
};
use crate::planner;
use crate::registry::Registry;

/// Quiet multiple of the beacon interval after which an agent is
/// considered gone and an untracked pending row orphaned.
const OFFLINE_MULTIPLIER: i64 = 3;

pub struct Orchestrator {
    db: Arc<Database>,
    registry: Arc<Registry>,
    dispatch: Arc<DispatchQueue>,
    catalog: Arc<Catalog>,
    aggregator: Arc<Aggregator>,
    hub: EventHub,
    beacon_interval_secs: u64,
}

impl Orchestrator {
    pub fn new(
        db: Arc<Database>,
        registry: Arc<Registry>,
        dispatch: Arc<DispatchQueue>,
        catalog: Arc<Catalog>,
        aggregator: Arc<Aggregator>,
        hub: EventHub,
        beacon_interval_secs: u64,
    ) -> Self {
        Orchestrator {
            db,
            registry,
            dispatch,
            catalog,
            aggregator,
            hub,
            beacon_interval_secs,
        }
    }

    /// Plan and launch a scenario against the given agents, or against
    /// every online agent when `target_paws` is empty.
    ///
    /// An unknown scenario leaves no trace; a planning failure leaves the
    /// execution row behind marked `failed`. A plan with zero dispatchable
    /// tasks completes on the spot with a zero score.
    pub fn start_execution(
        &self,
        scenario_id: &str,
        target_paws: &[String],
        safe_mode: bool,
    ) -> Result<Execution, String> {
        let scenario = self
            .catalog
            .scenario(scenario_id)
            .map_err(|e| format!("loading scenario {}: {}", scenario_id, e))?
            .ok_or_else(|| format!("scenario not found: {}", scenario_id))?;

        let targets = self.resolve_targets(target_paws);
        let catalog_snapshot = self.catalog_snapshot()?;

        let mut execution = Execution {
            id: Uuid::new_v4().to_string(),
            scenario_id: scenario.id.clone(),
            status: ExecutionStatus::Pending,
            safe_mode,
            score: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.db
            .create_execution(&execution)
            .map_err(|e| format!("creating execution: {}", e))?;

        let plan = match planner::build_plan(
            &execution.id,
            &scenario,
            &catalog_snapshot,
            &targets,
            safe_mode,
        ) {
            Ok(plan) => plan,
            Err(reason) => {
                let message = format!("planning execution {} failed: {}", execution.id, reason);
                log::error!("{}", message);
                self.db
                    .finalize_execution(&execution.id, ExecutionStatus::Failed, None, Utc::now())
                    .map_err(|e| format!("marking execution failed: {}", e))?;
                self.hub.publish(Event::error(&message));
                return Err(message);
            }
        };

        self.persist_plan_rows(&plan)?;

        let now = Utc::now();
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(now);
        self.db
            .update_execution(&execution)
            .map_err(|e| format!("starting execution: {}", e))?;

        self.dispatch.enqueue(plan.tasks.clone());
        log::info!(
            "Execution {} started: {} tasks queued, {} techniques skipped",
            execution.id,
            plan.tasks.len(),
            plan.skipped.len()
        );
        self.hub.publish(Event::execution_started(
            &execution,
            plan.tasks.len(),
            plan.skipped.len(),
        ));

        if plan.tasks.is_empty() {
            // No agent will ever beacon for this run; settle it now.
            let score = SecurityScore::empty();
            let finished = self
                .db
                .finalize_execution(&execution.id, ExecutionStatus::Completed, Some(&score), now)
                .map_err(|e| format!("completing empty execution: {}", e))?;
            if finished {
                execution.status = ExecutionStatus::Completed;
                execution.completed_at = Some(now);
                execution.score = Some(score);
                self.hub.publish(Event::execution_completed(&execution));
            }
        }

        Ok(execution)
    }

    /// Stop a live execution. Dispatched commands are not recalled from
    /// the agent; their rows flip to skipped so any late submission lands
    /// as a no-op.
    pub fn cancel_execution(&self, id: &str) -> Result<Execution, String> {
        let execution = self
            .db
            .find_execution(id)
            .map_err(|e| format!("loading execution {}: {}", id, e))?
            .ok_or_else(|| format!("execution not found: {}", id))?;

        match execution.status {
            ExecutionStatus::Pending | ExecutionStatus::Running => {}
            other => return Err(format!("execution {} is already {}", id, other.as_str())),
        }

        // Flip status first so concurrent result folds stand down, then
        // retire whatever was still outstanding.
        let flipped = self
            .db
            .finalize_execution(id, ExecutionStatus::Cancelled, None, Utc::now())
            .map_err(|e| format!("cancelling execution {}: {}", id, e))?;
        if !flipped {
            return Err(format!(
                "execution {} settled before it could be cancelled",
                id
            ));
        }

        let dropped = self.dispatch.remove_execution(id);
        log::info!(
            "Execution {} cancelled; {} outstanding tasks dropped from dispatch",
            id,
            dropped.len()
        );

        let rows = self
            .db
            .list_results_by_execution(id)
            .map_err(|e| format!("listing results for {}: {}", id, e))?;
        for row in rows {
            if row.status == ResultStatus::Pending {
                self.aggregator
                    .skip_task(&row.id)
                    .map_err(|e| format!("skipping task {}: {}", row.id, e))?;
            }
        }

        let score = self
            .aggregator
            .score_for(id)
            .map_err(|e| format!("scoring cancelled execution {}: {}", id, e))?;
        let mut cancelled = self
            .db
            .find_execution(id)
            .map_err(|e| format!("reloading execution {}: {}", id, e))?
            .ok_or_else(|| format!("execution not found: {}", id))?;
        cancelled.score = Some(score);
        self.db
            .update_execution(&cancelled)
            .map_err(|e| format!("storing final score for {}: {}", id, e))?;

        self.hub.publish(Event::execution_completed(&cancelled));
        Ok(cancelled)
    }

    /// One pass of the liveness and timeout housekeeping loop.
    ///
    /// Flips quiet agents offline, retires their queued work, times out
    /// tasks stuck at an agent, and skips pending rows nothing tracks
    /// anymore (left behind by a restart).
    pub fn run_sweep(&self, now: DateTime<Utc>) -> Result<(), String> {
        let window = Duration::seconds(self.beacon_interval_secs as i64 * OFFLINE_MULTIPLIER);

        for paw in self.registry.sweep_offline(window) {
            log::info!("Agent {} went quiet; marking offline", paw);
            self.hub.publish(Event::agent_disconnected(&paw));
            for task in self.dispatch.remove_agent_queued(&paw) {
                self.aggregator
                    .skip_task(&task.id)
                    .map_err(|e| format!("skipping task {}: {}", task.id, e))?;
            }
        }

        let grace = Duration::seconds(self.beacon_interval_secs as i64);
        for task in self.dispatch.sweep_timeouts(now, grace) {
            log::warn!(
                "Task {} timed out waiting on agent {}; marking skipped",
                task.id,
                task.agent_paw
            );
            self.aggregator
                .skip_task(&task.id)
                .map_err(|e| format!("skipping task {}: {}", task.id, e))?;
        }

        let cutoff = now - window;
        let stale = self
            .db
            .list_stale_pending_results(cutoff)
            .map_err(|e| format!("listing stale pending results: {}", e))?;
        for row in stale {
            if self.dispatch.is_tracked(&row.id) {
                continue;
            }
            log::warn!(
                "Pending result {} has no live task tracking it; marking skipped",
                row.id
            );
            self.aggregator
                .skip_task(&row.id)
                .map_err(|e| format!("skipping task {}: {}", row.id, e))?;
        }

        Ok(())
    }

    fn resolve_targets(&self, paws: &[String]) -> Vec<Agent> {
        if paws.is_empty() {
            return self
                .registry
                .list_all()
                .into_iter()
                .filter(|a| a.status == AgentStatus::Online)
                .collect();
        }

        let mut targets = Vec::new();
        for paw in paws {
            match self.registry.find(paw) {
                Some(agent) => targets.push(agent),
                None => log::warn!("Target agent {} is not registered; ignoring", paw),
            }
        }
        targets
    }

    fn catalog_snapshot(&self) -> Result<HashMap<String, Technique>, String> {
        let techniques = self
            .catalog
            .techniques()
            .map_err(|e| format!("loading technique catalog: {}", e))?;
        Ok(techniques.into_iter().map(|t| (t.id.clone(), t)).collect())
    }

    /// Write one pending row per planned task and one skipped row per
    /// technique that will not run anywhere in this execution.
    ///
    /// A technique planned in one phase can still appear in the skip list
    /// for a later phase; it gets no skip row, since it does run.
    fn persist_plan_rows(&self, plan: &Plan) -> Result<(), String> {
        let now = Utc::now();
        for task in &plan.tasks {
            let row = ExecutionResult {
                id: task.id.clone(),
                execution_id: task.execution_id.clone(),
                technique_id: task.technique_id.clone(),
                agent_paw: task.agent_paw.clone(),
                status: ResultStatus::Pending,
                output: None,
                exit_code: None,
                detected_by: None,
                created_at: now,
                updated_at: now,
            };
            self.db
                .create_result(&row)
                .map_err(|e| format!("persisting planned task {}: {}", task.id, e))?;
        }

        let planned: HashSet<&str> = plan
            .tasks
            .iter()
            .map(|t| t.technique_id.as_str())
            .collect();
        let mut recorded: HashSet<&str> = HashSet::new();
        for skip in &plan.skipped {
            if planned.contains(skip.technique_id.as_str()) {
                continue;
            }
            if !recorded.insert(skip.technique_id.as_str()) {
                continue;
            }
            let row = ExecutionResult {
                id: Uuid::new_v4().to_string(),
                execution_id: plan.execution_id.clone(),
                technique_id: skip.technique_id.clone(),
                agent_paw: String::new(),
                status: ResultStatus::Skipped,
                output: Some(skip.reason.clone()),
                exit_code: None,
                detected_by: None,
                created_at: now,
                updated_at: now,
            };
            self.db
                .create_result(&row)
                .map_err(|e| format!("persisting skipped technique {}: {}", skip.technique_id, e))?;
        }

        Ok(())
    }
}
