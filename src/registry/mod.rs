//! Authoritative in-memory view of the agent fleet.
//!
//! The map is the single source of truth for liveness. Rows are mirrored
//! to storage on every upsert and reloaded once at startup, but the sweep
//! never consults the database: an agent is whatever the map says it is.
//! Liveness is time-based and settled by the periodic sweep, so lookups
//! stay O(1) map reads with no clock checks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::RwLock;

use crate::db::Database;
use crate::models::{Agent, AgentStatus, Technique};

pub struct Registry {
    agents: RwLock<HashMap<String, Agent>>,
    db: Arc<Database>,
}

impl Registry {
    pub fn new(db: Arc<Database>) -> Self {
        Registry {
            agents: RwLock::new(HashMap::new()),
            db,
        }
    }

    /// Load persisted agents into the map. Called once at startup; the
    /// first liveness sweep settles any statuses that went stale while
    /// the server was down.
    pub fn load(&self) -> Result<usize, String> {
        let rows = self
            .db
            .list_agents()
            .map_err(|e| format!("load agents: {}", e))?;
        let count = rows.len();

        let mut agents = self.agents.write();
        for agent in rows {
            agents.insert(agent.paw.clone(), agent);
        }
        Ok(count)
    }

    /// Create or refresh an agent from beacon contact. Returns true when
    /// the contact brought the agent online (first sighting, or a paw
    /// that was not online before).
    pub fn upsert(&self, mut agent: Agent) -> Result<bool, String> {
        if agent.paw.trim().is_empty() {
            return Err("agent paw must not be empty".to_string());
        }

        let connected;
        {
            let mut agents = self.agents.write();
            match agents.get(&agent.paw) {
                Some(existing) => {
                    connected = existing.status != AgentStatus::Online;
                    agent.created_at = existing.created_at;
                }
                None => connected = true,
            }
            agents.insert(agent.paw.clone(), agent.clone());
        }

        // Mirror to storage outside the lock. The map is not rolled back
        // on failure: it reflects live network reality, which does not
        // depend on the disk.
        self.db
            .save_agent(&agent)
            .map_err(|e| format!("persist agent {}: {}", agent.paw, e))?;

        Ok(connected)
    }

    pub fn find(&self, paw: &str) -> Option<Agent> {
        self.agents.read().get(paw).cloned()
    }

    pub fn list_all(&self) -> Vec<Agent> {
        let mut all: Vec<Agent> = self.agents.read().values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.paw.cmp(&b.paw))
        });
        all
    }

    pub fn online_count(&self) -> usize {
        self.agents
            .read()
            .values()
            .filter(|a| a.status == AgentStatus::Online)
            .count()
    }

    /// Online agents that can run at least one of the technique's executor
    /// variants. Exact platform match plus executor-kind intersection; no
    /// partial credit. An empty result is not an error.
    pub fn find_online_compatible(&self, technique: &Technique) -> Vec<Agent> {
        let mut matches: Vec<Agent> = self
            .agents
            .read()
            .values()
            .filter(|a| a.status == AgentStatus::Online)
            .filter(|a| !technique.variants_for(&a.platform, &a.executors).is_empty())
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.paw.cmp(&b.paw));
        matches
    }

    /// Operator-driven: flip the agent offline right away instead of
    /// waiting for the liveness sweep. Returns false for an unknown paw.
    pub fn deactivate(&self, paw: &str) -> Result<bool, String> {
        if paw.trim().is_empty() {
            return Err("agent paw must not be empty".to_string());
        }

        let found = {
            let mut agents = self.agents.write();
            match agents.get_mut(paw) {
                Some(agent) => {
                    agent.status = AgentStatus::Offline;
                    true
                }
                None => false,
            }
        };

        if found {
            self.db
                .update_agent_status(paw, AgentStatus::Offline)
                .map_err(|e| format!("persist agent {}: {}", paw, e))?;
        }

        Ok(found)
    }

    /// Flip agents not heard from within `window` to offline. Returns the
    /// paws that changed state this pass so the caller can retire their
    /// queued tasks and announce the disconnects.
    pub fn sweep_offline(&self, window: Duration) -> Vec<String> {
        let cutoff = Utc::now() - window;
        let mut flipped = Vec::new();

        {
            let mut agents = self.agents.write();
            for agent in agents.values_mut() {
                let alive = matches!(agent.status, AgentStatus::Online | AgentStatus::Busy);
                if alive && agent.last_seen < cutoff {
                    agent.status = AgentStatus::Offline;
                    flipped.push(agent.paw.clone());
                }
            }
        }

        for paw in &flipped {
            if let Err(e) = self.db.update_agent_status(paw, AgentStatus::Offline) {
                log::warn!("Failed to persist offline status for {}: {}", paw, e);
            }
        }

        flipped
    }
}

#[cfg(test)]
mod registry_tests;
