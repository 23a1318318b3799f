//! Read-only lookup into the technique and scenario catalog.
//!
//! The core never edits catalog entries; they arrive through the REST API
//! or the built-in seed set installed on first boot.

use std::sync::Arc;

use rusqlite::Result as SqliteResult;

use crate::db::Database;
use crate::models::{ExecutorVariant, Phase, Scenario, Technique};

pub struct Catalog {
    db: Arc<Database>,
}

impl Catalog {
    pub fn new(db: Arc<Database>) -> Self {
        Catalog { db }
    }

    pub fn technique(&self, id: &str) -> SqliteResult<Option<Technique>> {
        self.db.find_technique(id)
    }

    pub fn techniques(&self) -> SqliteResult<Vec<Technique>> {
        self.db.list_techniques()
    }

    pub fn technique_count(&self) -> SqliteResult<u32> {
        self.db.count_techniques()
    }

    pub fn scenario(&self, id: &str) -> SqliteResult<Option<Scenario>> {
        self.db.find_scenario(id)
    }

    pub fn scenarios(&self) -> SqliteResult<Vec<Scenario>> {
        self.db.list_scenarios()
    }

    /// Seed the built-in discovery techniques and the baseline scenario so
    /// a fresh server is exercisable end to end. No-op once the catalog
    /// holds anything. Returns how many techniques were installed.
    pub fn install_defaults(&self) -> SqliteResult<usize> {
        if self.db.count_techniques()? > 0 {
            return Ok(0);
        }

        let techniques = default_techniques();
        for technique in &techniques {
            self.db.save_technique(technique)?;
        }
        self.db.save_scenario(&baseline_scenario(&techniques))?;

        Ok(techniques.len())
    }
}

fn shell_variant(kind: &str, platform: &str, command: &str) -> ExecutorVariant {
    ExecutorVariant {
        name: format!("{}-{}", kind, platform),
        kind: kind.to_string(),
        platform: Some(platform.to_string()),
        command: command.to_string(),
        cleanup: None,
        timeout_secs: 60,
        elevation_required: false,
    }
}

fn default_techniques() -> Vec<Technique> {
    vec![
        Technique {
            id: "T1082".to_string(),
            name: "System Information Discovery".to_string(),
            tactic: "discovery".to_string(),
            executors: vec![
                shell_variant("psh", "windows", "Get-ComputerInfo | Select-Object OsName, OsVersion, CsName"),
                shell_variant("cmd", "windows", "systeminfo"),
                shell_variant("bash", "linux", "uname -a && cat /etc/os-release"),
                shell_variant("sh", "darwin", "uname -a && sw_vers"),
            ],
            is_safe: true,
            detection: Some("Process monitoring for system enumeration utilities".to_string()),
        },
        Technique {
            id: "T1033".to_string(),
            name: "System Owner/User Discovery".to_string(),
            tactic: "discovery".to_string(),
            executors: vec![
                shell_variant("psh", "windows", "whoami /all"),
                shell_variant("cmd", "windows", "whoami && query user"),
                shell_variant("bash", "linux", "whoami && id && who"),
                shell_variant("sh", "darwin", "whoami && id"),
            ],
            is_safe: true,
            detection: Some("Command-line auditing for whoami and account lookups".to_string()),
        },
        Technique {
            id: "T1057".to_string(),
            name: "Process Discovery".to_string(),
            tactic: "discovery".to_string(),
            executors: vec![
                shell_variant("psh", "windows", "Get-Process | Select-Object -First 50 Name, Id"),
                shell_variant("cmd", "windows", "tasklist"),
                shell_variant("bash", "linux", "ps aux | head -n 50"),
                shell_variant("sh", "darwin", "ps aux | head -n 50"),
            ],
            is_safe: true,
            detection: Some("Process creation telemetry for enumeration commands".to_string()),
        },
        Technique {
            id: "T1016".to_string(),
            name: "System Network Configuration Discovery".to_string(),
            tactic: "discovery".to_string(),
            executors: vec![
                shell_variant("psh", "windows", "Get-NetIPConfiguration"),
                shell_variant("cmd", "windows", "ipconfig /all"),
                shell_variant("bash", "linux", "ip addr && ip route"),
                shell_variant("sh", "darwin", "ifconfig && netstat -rn"),
            ],
            is_safe: true,
            detection: Some("Network configuration utility execution monitoring".to_string()),
        },
        Technique {
            id: "T1083".to_string(),
            name: "File and Directory Discovery".to_string(),
            tactic: "discovery".to_string(),
            executors: vec![
                shell_variant("psh", "windows", "Get-ChildItem -Path $env:USERPROFILE | Select-Object -First 20"),
                shell_variant("cmd", "windows", "dir %USERPROFILE%"),
                shell_variant("bash", "linux", "ls -la ~ && ls -la /tmp"),
                shell_variant("sh", "darwin", "ls -la ~ && ls -la /tmp"),
            ],
            is_safe: true,
            detection: Some("File access auditing on user profile roots".to_string()),
        },
    ]
}

fn baseline_scenario(techniques: &[Technique]) -> Scenario {
    Scenario {
        id: "discovery-baseline".to_string(),
        name: "Discovery Baseline".to_string(),
        description: "Safe reconnaissance sweep establishing a detection baseline".to_string(),
        phases: vec![Phase {
            name: "discovery".to_string(),
            techniques: techniques.iter().map(|t| t.id.clone()).collect(),
        }],
    }
}

#[cfg(test)]
mod catalog_tests;
