use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Liveness/trust state of a fleet agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
    Busy,
    Untrusted,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Busy => "busy",
            AgentStatus::Untrusted => "untrusted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "online" => Some(AgentStatus::Online),
            "offline" => Some(AgentStatus::Offline),
            "busy" => Some(AgentStatus::Busy),
            "untrusted" => Some(AgentStatus::Untrusted),
            _ => None,
        }
    }
}

/// A remote execution agent, keyed by its paw.
///
/// Created on first successful beacon; status is driven by contact recency
/// and explicit deactivation, never by request handlers directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub paw: String,
    pub hostname: String,
    /// Operating system family as the agent reports it ("linux", "windows", "darwin")
    pub platform: String,
    /// Executor kinds the agent can run ("psh", "cmd", "bash", "sh", "zsh")
    pub executors: Vec<String>,
    pub status: AgentStatus,
    pub last_seen: DateTime<Utc>,
    /// Free-form self-reported details (username, ip, agent version, ...)
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}
