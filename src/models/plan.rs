use serde::{Deserialize, Serialize};

/// One concrete command assignment produced by the planner.
///
/// `id` is the task id the agent echoes back with its result; tasks are
/// ordered by `sequence` across the whole plan so phase boundaries survive
/// the trip through storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    pub id: String,
    pub execution_id: String,
    pub technique_id: String,
    pub agent_paw: String,
    pub executor_kind: String,
    pub executor_name: String,
    pub phase: String,
    pub sequence: u32,
    pub command: String,
    pub timeout_secs: u32,
}

/// Technique the planner could not assign, with the reason left for the
/// operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedTechnique {
    pub technique_id: String,
    pub phase: String,
    pub reason: String,
}

/// Full output of planning one scenario against a set of agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub execution_id: String,
    pub tasks: Vec<PlannedTask>,
    pub skipped: Vec<SkippedTechnique>,
}
