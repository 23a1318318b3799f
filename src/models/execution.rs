use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    /// Planning failed before any task could run
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ExecutionStatus::Pending),
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "failed" => Some(ExecutionStatus::Failed),
            "cancelled" => Some(ExecutionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Defensive posture summary computed from the terminal results of a run.
///
/// `overall` weighs blocked at full credit and detected at half, over the
/// techniques that actually ran. Skipped techniques never count against
/// the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScore {
    pub blocked: u32,
    pub detected: u32,
    pub successful: u32,
    pub total: u32,
    pub overall: f64,
    #[serde(default)]
    pub by_tactic: HashMap<String, f64>,
}

impl SecurityScore {
    pub fn empty() -> Self {
        SecurityScore {
            blocked: 0,
            detected: 0,
            successful: 0,
            total: 0,
            overall: 0.0,
            by_tactic: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub scenario_id: String,
    pub status: ExecutionStatus,
    pub safe_mode: bool,
    #[serde(default)]
    pub score: Option<SecurityScore>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request to launch an execution over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExecutionRequest {
    pub scenario_id: String,
    /// Empty targets every online agent
    #[serde(default)]
    pub agent_paws: Vec<String>,
    #[serde(default)]
    pub safe_mode: bool,
}
