//! In-memory task queue between the planner and the beacon handler.
//!
//! A task is `queued` from planning until an agent beacon picks it up,
//! then `dispatched` until its result arrives or the timeout sweep
//! retires it. The durable shadow of every entry is the pending result
//! row sharing its id; this structure only decides what each agent is
//! handed next. Lock sections are short and never span a storage call.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::models::PlannedTask;

struct DispatchedTask {
    task: PlannedTask,
    dispatched_at: DateTime<Utc>,
}

#[derive(Default)]
struct QueueState {
    /// Tasks not yet handed out, keyed by agent paw, in plan order.
    queued: HashMap<String, VecDeque<PlannedTask>>,
    /// Tasks handed to an agent and awaiting a result, keyed by task id.
    dispatched: HashMap<String, DispatchedTask>,
}

pub struct DispatchQueue {
    state: RwLock<QueueState>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        DispatchQueue {
            state: RwLock::new(QueueState::default()),
        }
    }

    /// Queue a plan's tasks for their assigned agents, preserving sequence
    /// order within each agent's queue.
    pub fn enqueue(&self, tasks: Vec<PlannedTask>) {
        let mut state = self.state.write();
        for task in tasks {
            state
                .queued
                .entry(task.agent_paw.clone())
                .or_default()
                .push_back(task);
        }
    }

    /// Hand out everything queued for `paw`, moving each task to the
    /// dispatched set stamped with `now`.
    pub fn take_for_agent(&self, paw: &str, now: DateTime<Utc>) -> Vec<PlannedTask> {
        let mut state = self.state.write();
        let tasks: Vec<PlannedTask> = match state.queued.remove(paw) {
            Some(queue) => queue.into(),
            None => return Vec::new(),
        };

        for task in &tasks {
            state.dispatched.insert(
                task.id.clone(),
                DispatchedTask {
                    task: task.clone(),
                    dispatched_at: now,
                },
            );
        }

        tasks
    }

    /// Forget a task once its result has been recorded. Unknown ids are
    /// fine; replayed results land here after the first delivery.
    pub fn complete(&self, task_id: &str) {
        let mut state = self.state.write();
        if state.dispatched.remove(task_id).is_some() {
            return;
        }
        for queue in state.queued.values_mut() {
            if let Some(pos) = queue.iter().position(|t| t.id == task_id) {
                queue.remove(pos);
                return;
            }
        }
    }

    /// Drop every task belonging to `execution_id`, queued or dispatched.
    /// Returns the removed tasks so the caller can retire their rows.
    pub fn remove_execution(&self, execution_id: &str) -> Vec<PlannedTask> {
        let mut state = self.state.write();
        let mut removed = Vec::new();

        for queue in state.queued.values_mut() {
            let mut kept = VecDeque::with_capacity(queue.len());
            while let Some(task) = queue.pop_front() {
                if task.execution_id == execution_id {
                    removed.push(task);
                } else {
                    kept.push_back(task);
                }
            }
            *queue = kept;
        }
        state.queued.retain(|_, queue| !queue.is_empty());

        let stale_ids: Vec<String> = state
            .dispatched
            .values()
            .filter(|d| d.task.execution_id == execution_id)
            .map(|d| d.task.id.clone())
            .collect();
        for id in stale_ids {
            if let Some(dispatched) = state.dispatched.remove(&id) {
                removed.push(dispatched.task);
            }
        }

        removed
    }

    /// Drop the still-queued tasks of an agent that went offline. Tasks
    /// already dispatched stay put; the timeout sweep owns those.
    pub fn remove_agent_queued(&self, paw: &str) -> Vec<PlannedTask> {
        let mut state = self.state.write();
        match state.queued.remove(paw) {
            Some(queue) => queue.into(),
            None => Vec::new(),
        }
    }

    /// Retire dispatched tasks whose agent never answered: anything older
    /// than its own timeout plus `grace` comes back for skipping.
    pub fn sweep_timeouts(&self, now: DateTime<Utc>, grace: Duration) -> Vec<PlannedTask> {
        let mut state = self.state.write();

        let overdue: Vec<String> = state
            .dispatched
            .values()
            .filter(|d| {
                let deadline =
                    d.dispatched_at + Duration::seconds(d.task.timeout_secs as i64) + grace;
                now > deadline
            })
            .map(|d| d.task.id.clone())
            .collect();

        let mut removed = Vec::with_capacity(overdue.len());
        for id in overdue {
            if let Some(dispatched) = state.dispatched.remove(&id) {
                removed.push(dispatched.task);
            }
        }
        removed
    }

    /// Whether the queue still knows this task, queued or dispatched.
    pub fn is_tracked(&self, task_id: &str) -> bool {
        let state = self.state.read();
        state.dispatched.contains_key(task_id)
            || state
                .queued
                .values()
                .any(|queue| queue.iter().any(|t| t.id == task_id))
    }

    /// Tasks not yet handed to any agent.
    pub fn queued_count(&self) -> usize {
        self.state
            .read()
            .queued
            .values()
            .map(|queue| queue.len())
            .sum()
    }

    /// Tasks handed out and awaiting results.
    pub fn dispatched_count(&self) -> usize {
        self.state.read().dispatched.len()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod dispatch_tests;
