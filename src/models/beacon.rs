use serde::{Deserialize, Serialize};

/// Check-in payload posted by an agent on every beacon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconRequest {
    /// Empty on an agent's first contact; the server assigns one
    #[serde(default)]
    pub paw: String,
    pub hostname: String,
    pub platform: String,
    #[serde(default)]
    pub executors: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub results: Vec<BeaconResult>,
}

/// Completed task outcome carried inside a beacon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconResult {
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// Work handed back to the agent in the beacon response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstruction {
    pub task_id: String,
    pub technique_id: String,
    pub executor_kind: String,
    pub command: String,
    pub timeout: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconResponse {
    pub paw: String,
    /// Seconds until the agent should beacon again, jitter included
    pub sleep: u64,
    pub tasks: Vec<TaskInstruction>,
}
