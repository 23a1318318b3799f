use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Agent, Execution, ExecutionResult};

/// Event types fanned out to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    AgentConnected,
    AgentDisconnected,
    ExecutionStarted,
    TechniqueCompleted,
    ExecutionCompleted,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentConnected => "agent_connected",
            Self::AgentDisconnected => "agent_disconnected",
            Self::ExecutionStarted => "execution_started",
            Self::TechniqueCompleted => "technique_completed",
            Self::ExecutionCompleted => "execution_completed",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<EventType> {
        match s {
            "agent_connected" => Some(EventType::AgentConnected),
            "agent_disconnected" => Some(EventType::AgentDisconnected),
            "execution_started" => Some(EventType::ExecutionStarted),
            "technique_completed" => Some(EventType::TechniqueCompleted),
            "execution_completed" => Some(EventType::ExecutionCompleted),
            "error" => Some(EventType::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Envelope pushed to every hub subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: String,
    pub payload: Value,
}

impl Event {
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_type: event_type.as_str().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            payload,
        }
    }

    pub fn agent_connected(agent: &Agent) -> Self {
        Self::new(
            EventType::AgentConnected,
            serde_json::json!({
                "paw": agent.paw,
                "hostname": agent.hostname,
                "platform": agent.platform,
                "executors": agent.executors
            }),
        )
    }

    pub fn agent_disconnected(paw: &str) -> Self {
        Self::new(
            EventType::AgentDisconnected,
            serde_json::json!({
                "paw": paw
            }),
        )
    }

    pub fn execution_started(execution: &Execution, task_count: usize, skipped_count: usize) -> Self {
        Self::new(
            EventType::ExecutionStarted,
            serde_json::json!({
                "execution_id": execution.id,
                "scenario_id": execution.scenario_id,
                "safe_mode": execution.safe_mode,
                "task_count": task_count,
                "skipped_count": skipped_count
            }),
        )
    }

    pub fn technique_completed(result: &ExecutionResult) -> Self {
        Self::new(
            EventType::TechniqueCompleted,
            serde_json::json!({
                "execution_id": result.execution_id,
                "technique_id": result.technique_id,
                "agent_paw": result.agent_paw,
                "status": result.status.as_str(),
                "exit_code": result.exit_code,
                "detected_by": result.detected_by
            }),
        )
    }

    pub fn execution_completed(execution: &Execution) -> Self {
        Self::new(
            EventType::ExecutionCompleted,
            serde_json::json!({
                "execution_id": execution.id,
                "scenario_id": execution.scenario_id,
                "status": execution.status.as_str(),
                "score": execution.score
            }),
        )
    }

    pub fn error(message: &str) -> Self {
        Self::new(
            EventType::Error,
            serde_json::json!({
                "message": message
            }),
        )
    }
}
