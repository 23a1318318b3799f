//! Technique and scenario catalog database operations

use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;
use crate::models::{Scenario, Technique};

impl Database {
    // Technique methods
    pub fn save_technique(&self, technique: &Technique) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let executors_json =
            serde_json::to_string(&technique.executors).unwrap_or_else(|_| "[]".to_string());

        let rows_affected = conn.execute(
            "UPDATE techniques SET name = ?1, tactic = ?2, executors = ?3, is_safe = ?4, detection = ?5
             WHERE id = ?6",
            rusqlite::params![
                technique.name,
                technique.tactic,
                executors_json,
                if technique.is_safe { 1 } else { 0 },
                technique.detection,
                technique.id,
            ],
        )?;

        if rows_affected == 0 {
            conn.execute(
                "INSERT INTO techniques (id, name, tactic, executors, is_safe, detection)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    technique.id,
                    technique.name,
                    technique.tactic,
                    executors_json,
                    if technique.is_safe { 1 } else { 0 },
                    technique.detection,
                ],
            )?;
        }

        Ok(())
    }

    pub fn find_technique(&self, id: &str) -> SqliteResult<Option<Technique>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, name, tactic, executors, is_safe, detection FROM techniques WHERE id = ?1",
            [id],
            |row| self.map_technique_row(row),
        )
        .optional()
    }

    pub fn list_techniques(&self) -> SqliteResult<Vec<Technique>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, tactic, executors, is_safe, detection FROM techniques ORDER BY id",
        )?;

        let techniques = stmt
            .query_map([], |row| self.map_technique_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(techniques)
    }

    pub fn count_techniques(&self) -> SqliteResult<u32> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM techniques", [], |row| row.get(0))
    }

    pub fn delete_technique(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute("DELETE FROM techniques WHERE id = ?1", [id])?;
        Ok(rows_affected > 0)
    }

    fn map_technique_row(&self, row: &rusqlite::Row) -> SqliteResult<Technique> {
        let executors_str: String = row.get(3)?;

        Ok(Technique {
            id: row.get(0)?,
            name: row.get(1)?,
            tactic: row.get(2)?,
            executors: serde_json::from_str(&executors_str).unwrap_or_default(),
            is_safe: row.get::<_, i32>(4)? != 0,
            detection: row.get(5)?,
        })
    }

    // Scenario methods
    pub fn save_scenario(&self, scenario: &Scenario) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let phases_json =
            serde_json::to_string(&scenario.phases).unwrap_or_else(|_| "[]".to_string());

        let rows_affected = conn.execute(
            "UPDATE scenarios SET name = ?1, description = ?2, phases = ?3 WHERE id = ?4",
            rusqlite::params![scenario.name, scenario.description, phases_json, scenario.id],
        )?;

        if rows_affected == 0 {
            conn.execute(
                "INSERT INTO scenarios (id, name, description, phases) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![scenario.id, scenario.name, scenario.description, phases_json],
            )?;
        }

        Ok(())
    }

    pub fn find_scenario(&self, id: &str) -> SqliteResult<Option<Scenario>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, name, description, phases FROM scenarios WHERE id = ?1",
            [id],
            |row| self.map_scenario_row(row),
        )
        .optional()
    }

    pub fn list_scenarios(&self) -> SqliteResult<Vec<Scenario>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, description, phases FROM scenarios ORDER BY name")?;

        let scenarios = stmt
            .query_map([], |row| self.map_scenario_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(scenarios)
    }

    pub fn delete_scenario(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute("DELETE FROM scenarios WHERE id = ?1", [id])?;
        Ok(rows_affected > 0)
    }

    fn map_scenario_row(&self, row: &rusqlite::Row) -> SqliteResult<Scenario> {
        let phases_str: String = row.get(3)?;

        Ok(Scenario {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            phases: serde_json::from_str(&phases_str).unwrap_or_default(),
        })
    }
}
