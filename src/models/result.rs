use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one technique attempt on one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    /// Technique executed and was neither blocked nor detected
    Success,
    Blocked,
    Detected,
    /// Agent attempted the command but it errored out
    Failed,
    /// Never dispatched, or timed out waiting for the agent
    Skipped,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Success => "success",
            ResultStatus::Blocked => "blocked",
            ResultStatus::Detected => "detected",
            ResultStatus::Failed => "failed",
            ResultStatus::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ResultStatus::Pending),
            "success" => Some(ResultStatus::Success),
            "blocked" => Some(ResultStatus::Blocked),
            "detected" => Some(ResultStatus::Detected),
            "failed" => Some(ResultStatus::Failed),
            "skipped" => Some(ResultStatus::Skipped),
            _ => None,
        }
    }

    /// Anything past pending is final; later submissions for the task are no-ops.
    pub fn is_terminal(&self) -> bool {
        *self != ResultStatus::Pending
    }

    /// Worst-case ordering for the per-technique score fold:
    /// an undetected success outranks everything.
    pub fn severity(&self) -> u8 {
        match self {
            ResultStatus::Success => 4,
            ResultStatus::Detected => 3,
            ResultStatus::Blocked => 2,
            ResultStatus::Failed => 1,
            ResultStatus::Pending | ResultStatus::Skipped => 0,
        }
    }
}

/// The authoritative record of one (execution, technique, agent) attempt.
///
/// The row id doubles as the task id handed to the agent, which is what
/// makes result submission idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub id: String,
    pub execution_id: String,
    pub technique_id: String,
    pub agent_paw: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Control that caught the technique, when status is detected
    #[serde(default)]
    pub detected_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
