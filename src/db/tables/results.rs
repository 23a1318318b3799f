//! Task result database operations
//!
//! A result row is created in `pending` state when the planner assigns a
//! task, and its id is the task id agents echo back. Resolution guards on
//! the pending state so replayed beacons cannot overwrite a settled row.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;
use crate::models::{ExecutionResult, ResultStatus};

impl Database {
    pub fn create_result(&self, result: &ExecutionResult) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO results (id, execution_id, technique_id, agent_paw, status, output,
                    exit_code, detected_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                result.id,
                result.execution_id,
                result.technique_id,
                result.agent_paw,
                result.status.as_str(),
                result.output,
                result.exit_code,
                result.detected_by,
                result.created_at.to_rfc3339(),
                result.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Settle a pending result. Returns false when the row is already
    /// terminal (or unknown), which makes beacon replays no-ops.
    pub fn resolve_result(
        &self,
        id: &str,
        status: ResultStatus,
        output: Option<&str>,
        exit_code: Option<i32>,
        detected_by: Option<&str>,
    ) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let rows_affected = conn.execute(
            "UPDATE results SET status = ?1, output = ?2, exit_code = ?3, detected_by = ?4,
                    updated_at = ?5
             WHERE id = ?6 AND status = 'pending'",
            rusqlite::params![status.as_str(), output, exit_code, detected_by, now, id],
        )?;

        Ok(rows_affected > 0)
    }

    pub fn find_result(&self, id: &str) -> SqliteResult<Option<ExecutionResult>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, execution_id, technique_id, agent_paw, status, output, exit_code,
                    detected_by, created_at, updated_at
             FROM results WHERE id = ?1",
            [id],
            |row| self.map_result_row(row),
        )
        .optional()
    }

    pub fn list_results_by_execution(&self, execution_id: &str) -> SqliteResult<Vec<ExecutionResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, execution_id, technique_id, agent_paw, status, output, exit_code,
                    detected_by, created_at, updated_at
             FROM results WHERE execution_id = ?1 ORDER BY created_at",
        )?;

        let results = stmt
            .query_map([execution_id], |row| self.map_result_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(results)
    }

    /// Pending rows planned before `cutoff`, regardless of execution. Used
    /// by the dispatch sweep to retire tasks nothing will ever answer for.
    pub fn list_stale_pending_results(
        &self,
        cutoff: DateTime<Utc>,
    ) -> SqliteResult<Vec<ExecutionResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, execution_id, technique_id, agent_paw, status, output, exit_code,
                    detected_by, created_at, updated_at
             FROM results WHERE status = 'pending' AND created_at <= ?1 ORDER BY created_at",
        )?;

        let results = stmt
            .query_map([cutoff.to_rfc3339()], |row| self.map_result_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(results)
    }

    fn map_result_row(&self, row: &rusqlite::Row) -> SqliteResult<ExecutionResult> {
        let status_str: String = row.get(4)?;
        let created_at_str: String = row.get(8)?;
        let updated_at_str: String = row.get(9)?;

        Ok(ExecutionResult {
            id: row.get(0)?,
            execution_id: row.get(1)?,
            technique_id: row.get(2)?,
            agent_paw: row.get(3)?,
            status: ResultStatus::from_str(&status_str).unwrap_or(ResultStatus::Pending),
            output: row.get(5)?,
            exit_code: row.get(6)?,
            detected_by: row.get(7)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .unwrap()
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .unwrap()
                .with_timezone(&Utc),
        })
    }
}
