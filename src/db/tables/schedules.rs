//! Schedule database operations

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;
use crate::models::{Frequency, Schedule, ScheduleRun, ScheduleRunStatus, ScheduleStatus};

impl Database {
    pub fn create_schedule(&self, schedule: &Schedule) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO schedules (id, scenario_id, agent_paw, frequency, cron_expr, safe_mode,
                    status, next_run_at, last_run_at, last_run_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                schedule.id,
                schedule.scenario_id,
                schedule.agent_paw,
                schedule.frequency.as_str(),
                schedule.cron_expr,
                if schedule.safe_mode { 1 } else { 0 },
                schedule.status.as_str(),
                schedule.next_run_at.map(|t| t.to_rfc3339()),
                schedule.last_run_at.map(|t| t.to_rfc3339()),
                schedule.last_run_id,
                schedule.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    pub fn update_schedule(&self, schedule: &Schedule) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows_affected = conn.execute(
            "UPDATE schedules SET scenario_id = ?1, agent_paw = ?2, frequency = ?3, cron_expr = ?4,
                    safe_mode = ?5, status = ?6, next_run_at = ?7, last_run_at = ?8, last_run_id = ?9
             WHERE id = ?10",
            rusqlite::params![
                schedule.scenario_id,
                schedule.agent_paw,
                schedule.frequency.as_str(),
                schedule.cron_expr,
                if schedule.safe_mode { 1 } else { 0 },
                schedule.status.as_str(),
                schedule.next_run_at.map(|t| t.to_rfc3339()),
                schedule.last_run_at.map(|t| t.to_rfc3339()),
                schedule.last_run_id,
                schedule.id,
            ],
        )?;

        Ok(rows_affected > 0)
    }

    pub fn find_schedule(&self, id: &str) -> SqliteResult<Option<Schedule>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, scenario_id, agent_paw, frequency, cron_expr, safe_mode, status,
                    next_run_at, last_run_at, last_run_id, created_at
             FROM schedules WHERE id = ?1",
            [id],
            |row| self.map_schedule_row(row),
        )
        .optional()
    }

    pub fn list_schedules(&self) -> SqliteResult<Vec<Schedule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, scenario_id, agent_paw, frequency, cron_expr, safe_mode, status,
                    next_run_at, last_run_at, last_run_id, created_at
             FROM schedules ORDER BY created_at",
        )?;

        let schedules = stmt
            .query_map([], |row| self.map_schedule_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(schedules)
    }

    /// Active schedules whose next_run_at has passed, soonest first.
    pub fn list_due_schedules(&self, now: DateTime<Utc>) -> SqliteResult<Vec<Schedule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, scenario_id, agent_paw, frequency, cron_expr, safe_mode, status,
                    next_run_at, last_run_at, last_run_id, created_at
             FROM schedules
             WHERE status = 'active' AND next_run_at IS NOT NULL AND next_run_at <= ?1
             ORDER BY next_run_at ASC",
        )?;

        let schedules = stmt
            .query_map([now.to_rfc3339()], |row| self.map_schedule_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(schedules)
    }

    pub fn delete_schedule(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute("DELETE FROM schedules WHERE id = ?1", [id])?;
        Ok(rows_affected > 0)
    }

    fn map_schedule_row(&self, row: &rusqlite::Row) -> SqliteResult<Schedule> {
        let frequency_str: String = row.get(3)?;
        let status_str: String = row.get(6)?;
        let next_run_str: Option<String> = row.get(7)?;
        let last_run_str: Option<String> = row.get(8)?;
        let created_at_str: String = row.get(10)?;

        Ok(Schedule {
            id: row.get(0)?,
            scenario_id: row.get(1)?,
            agent_paw: row.get(2)?,
            frequency: Frequency::from_str(&frequency_str).unwrap_or(Frequency::Daily),
            cron_expr: row.get(4)?,
            safe_mode: row.get::<_, i32>(5)? != 0,
            status: ScheduleStatus::from_str(&status_str).unwrap_or(ScheduleStatus::Paused),
            next_run_at: next_run_str.map(|s| {
                DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)
            }),
            last_run_at: last_run_str.map(|s| {
                DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)
            }),
            last_run_id: row.get(9)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .unwrap()
                .with_timezone(&Utc),
        })
    }

    // Schedule run methods
    pub fn create_schedule_run(&self, run: &ScheduleRun) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO schedule_runs (id, schedule_id, execution_id, status, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                run.id,
                run.schedule_id,
                run.execution_id,
                run.status.as_str(),
                run.error,
                run.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    pub fn list_schedule_runs(&self, schedule_id: &str, limit: u32) -> SqliteResult<Vec<ScheduleRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, schedule_id, execution_id, status, error, created_at
             FROM schedule_runs WHERE schedule_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;

        let runs = stmt
            .query_map(rusqlite::params![schedule_id, limit], |row| {
                self.map_schedule_run_row(row)
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(runs)
    }

    fn map_schedule_run_row(&self, row: &rusqlite::Row) -> SqliteResult<ScheduleRun> {
        let status_str: String = row.get(3)?;
        let created_at_str: String = row.get(5)?;

        Ok(ScheduleRun {
            id: row.get(0)?,
            schedule_id: row.get(1)?,
            execution_id: row.get(2)?,
            status: ScheduleRunStatus::from_str(&status_str).unwrap_or(ScheduleRunStatus::Failed),
            error: row.get(4)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .unwrap()
                .with_timezone(&Utc),
        })
    }
}
