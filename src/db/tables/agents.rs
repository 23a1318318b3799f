//! Agent fleet database operations

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;
use crate::models::{Agent, AgentStatus};

impl Database {
    /// Insert or replace the full agent snapshot keyed by paw.
    pub fn save_agent(&self, agent: &Agent) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let executors_json =
            serde_json::to_string(&agent.executors).unwrap_or_else(|_| "[]".to_string());
        let metadata_json =
            serde_json::to_string(&agent.metadata).unwrap_or_else(|_| "{}".to_string());

        // Try to update first
        let rows_affected = conn.execute(
            "UPDATE agents SET hostname = ?1, platform = ?2, executors = ?3, status = ?4,
                    last_seen = ?5, metadata = ?6 WHERE paw = ?7",
            rusqlite::params![
                agent.hostname,
                agent.platform,
                executors_json,
                agent.status.as_str(),
                agent.last_seen.to_rfc3339(),
                metadata_json,
                agent.paw,
            ],
        )?;

        if rows_affected == 0 {
            conn.execute(
                "INSERT INTO agents (paw, hostname, platform, executors, status, last_seen, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    agent.paw,
                    agent.hostname,
                    agent.platform,
                    executors_json,
                    agent.status.as_str(),
                    agent.last_seen.to_rfc3339(),
                    metadata_json,
                    agent.created_at.to_rfc3339(),
                ],
            )?;
        }

        Ok(())
    }

    pub fn find_agent(&self, paw: &str) -> SqliteResult<Option<Agent>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT paw, hostname, platform, executors, status, last_seen, metadata, created_at
             FROM agents WHERE paw = ?1",
            [paw],
            |row| self.map_agent_row(row),
        )
        .optional()
    }

    pub fn list_agents(&self) -> SqliteResult<Vec<Agent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT paw, hostname, platform, executors, status, last_seen, metadata, created_at
             FROM agents ORDER BY created_at",
        )?;

        let agents = stmt
            .query_map([], |row| self.map_agent_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(agents)
    }

    pub fn update_agent_status(&self, paw: &str, status: AgentStatus) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute(
            "UPDATE agents SET status = ?1 WHERE paw = ?2",
            [status.as_str(), paw],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn delete_agent(&self, paw: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute("DELETE FROM agents WHERE paw = ?1", [paw])?;
        Ok(rows_affected > 0)
    }

    fn map_agent_row(&self, row: &rusqlite::Row) -> SqliteResult<Agent> {
        let executors_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let last_seen_str: String = row.get(5)?;
        let metadata_str: String = row.get(6)?;
        let created_at_str: String = row.get(7)?;

        Ok(Agent {
            paw: row.get(0)?,
            hostname: row.get(1)?,
            platform: row.get(2)?,
            executors: serde_json::from_str(&executors_str).unwrap_or_default(),
            status: AgentStatus::from_str(&status_str).unwrap_or(AgentStatus::Offline),
            last_seen: DateTime::parse_from_rfc3339(&last_seen_str)
                .unwrap()
                .with_timezone(&Utc),
            metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .unwrap()
                .with_timezone(&Utc),
        })
    }
}
