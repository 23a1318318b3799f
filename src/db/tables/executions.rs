//! Execution run database operations

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;
use crate::models::{Execution, ExecutionStatus, SecurityScore};

impl Database {
    pub fn create_execution(&self, execution: &Execution) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let score_json = execution
            .score
            .as_ref()
            .map(|s| serde_json::to_string(s).unwrap_or_else(|_| "{}".to_string()));

        conn.execute(
            "INSERT INTO executions (id, scenario_id, status, safe_mode, score, started_at, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                execution.id,
                execution.scenario_id,
                execution.status.as_str(),
                if execution.safe_mode { 1 } else { 0 },
                score_json,
                execution.started_at.map(|t| t.to_rfc3339()),
                execution.completed_at.map(|t| t.to_rfc3339()),
                execution.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Rewrite the mutable columns of an execution row.
    pub fn update_execution(&self, execution: &Execution) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let score_json = execution
            .score
            .as_ref()
            .map(|s| serde_json::to_string(s).unwrap_or_else(|_| "{}".to_string()));

        let rows_affected = conn.execute(
            "UPDATE executions SET status = ?1, score = ?2, started_at = ?3, completed_at = ?4
             WHERE id = ?5",
            rusqlite::params![
                execution.status.as_str(),
                score_json,
                execution.started_at.map(|t| t.to_rfc3339()),
                execution.completed_at.map(|t| t.to_rfc3339()),
                execution.id,
            ],
        )?;

        Ok(rows_affected > 0)
    }

    /// Refresh the running score without touching status. Guarded on the
    /// execution still being live so a stale fold cannot overwrite a
    /// terminal row.
    pub fn update_execution_score(&self, id: &str, score: &SecurityScore) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let score_json = serde_json::to_string(score).unwrap_or_else(|_| "{}".to_string());

        let rows_affected = conn.execute(
            "UPDATE executions SET score = ?1 WHERE id = ?2 AND status = 'running'",
            rusqlite::params![score_json, id],
        )?;

        Ok(rows_affected > 0)
    }

    /// Move a live execution to a terminal status. Guarded on the current
    /// status so two concurrent finalizers cannot both win; the caller
    /// that gets `true` owns the completion event.
    pub fn finalize_execution(
        &self,
        id: &str,
        status: ExecutionStatus,
        score: Option<&SecurityScore>,
        completed_at: DateTime<Utc>,
    ) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let score_json =
            score.map(|s| serde_json::to_string(s).unwrap_or_else(|_| "{}".to_string()));

        let rows_affected = conn.execute(
            "UPDATE executions SET status = ?1, score = ?2, completed_at = ?3
             WHERE id = ?4 AND status IN ('pending', 'running')",
            rusqlite::params![status.as_str(), score_json, completed_at.to_rfc3339(), id],
        )?;

        Ok(rows_affected > 0)
    }

    pub fn find_execution(&self, id: &str) -> SqliteResult<Option<Execution>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, scenario_id, status, safe_mode, score, started_at, completed_at, created_at
             FROM executions WHERE id = ?1",
            [id],
            |row| self.map_execution_row(row),
        )
        .optional()
    }

    pub fn list_executions(&self) -> SqliteResult<Vec<Execution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, scenario_id, status, safe_mode, score, started_at, completed_at, created_at
             FROM executions ORDER BY created_at DESC",
        )?;

        let executions = stmt
            .query_map([], |row| self.map_execution_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(executions)
    }

    pub fn list_executions_by_scenario(&self, scenario_id: &str) -> SqliteResult<Vec<Execution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, scenario_id, status, safe_mode, score, started_at, completed_at, created_at
             FROM executions WHERE scenario_id = ?1 ORDER BY created_at DESC",
        )?;

        let executions = stmt
            .query_map([scenario_id], |row| self.map_execution_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(executions)
    }

    pub fn list_recent_executions(&self, limit: u32) -> SqliteResult<Vec<Execution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, scenario_id, status, safe_mode, score, started_at, completed_at, created_at
             FROM executions ORDER BY created_at DESC LIMIT ?1",
        )?;

        let executions = stmt
            .query_map([limit], |row| self.map_execution_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(executions)
    }

    fn map_execution_row(&self, row: &rusqlite::Row) -> SqliteResult<Execution> {
        let status_str: String = row.get(2)?;
        let score_json: Option<String> = row.get(4)?;
        let started_at_str: Option<String> = row.get(5)?;
        let completed_at_str: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;

        Ok(Execution {
            id: row.get(0)?,
            scenario_id: row.get(1)?,
            status: ExecutionStatus::from_str(&status_str).unwrap_or(ExecutionStatus::Pending),
            safe_mode: row.get::<_, i32>(3)? != 0,
            score: score_json.and_then(|json| serde_json::from_str(&json).ok()),
            started_at: started_at_str.map(|s| {
                DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)
            }),
            completed_at: completed_at_str.map(|s| {
                DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)
            }),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .unwrap()
                .with_timezone(&Utc),
        })
    }
}
