use serde::{Deserialize, Serialize};

/// One ordered step of a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    /// Technique ids in execution order
    pub techniques: Vec<String>,
}

/// An ordered sequence of technique phases, read-only to the core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub phases: Vec<Phase>,
}

impl Scenario {
    /// All technique ids across phases, in plan order (duplicates kept).
    pub fn technique_ids(&self) -> Vec<&str> {
        self.phases
            .iter()
            .flat_map(|p| p.techniques.iter().map(|t| t.as_str()))
            .collect()
    }
}

/// Request to create a scenario over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScenarioRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub phases: Vec<Phase>,
}
