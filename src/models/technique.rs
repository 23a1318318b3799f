use serde::{Deserialize, Serialize};

/// One platform/executor-specific way to run a technique
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorVariant {
    pub name: String,
    /// Executor kind the command is written for ("psh", "cmd", "bash", "sh", "zsh")
    pub kind: String,
    /// Restrict this variant to one platform; None means any platform
    #[serde(default)]
    pub platform: Option<String>,
    pub command: String,
    #[serde(default)]
    pub cleanup: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub elevation_required: bool,
}

fn default_timeout() -> u32 {
    60
}

/// An adversarial technique definition from the catalog, read-only to the core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technique {
    /// MITRE ATT&CK technique id, e.g. "T1082"
    pub id: String,
    pub name: String,
    /// MITRE tactic, e.g. "discovery"
    pub tactic: String,
    /// Ordered command variants; order matters for deterministic planning
    pub executors: Vec<ExecutorVariant>,
    pub is_safe: bool,
    /// Hint naming the control expected to catch this technique
    #[serde(default)]
    pub detection: Option<String>,
}

impl Technique {
    /// Variants usable on the given platform with the given executor set,
    /// in declared order.
    pub fn variants_for(&self, platform: &str, executors: &[String]) -> Vec<&ExecutorVariant> {
        self.executors
            .iter()
            .filter(|v| v.platform.as_deref().map_or(true, |p| p == platform))
            .filter(|v| executors.iter().any(|e| *e == v.kind))
            .collect()
    }
}
