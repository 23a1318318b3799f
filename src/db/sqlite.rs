use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Mutex;

pub struct Database {
    pub(super) conn: Mutex<Connection>,
}

impl Database {
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        // Agent fleet table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agents (
                paw TEXT PRIMARY KEY,
                hostname TEXT NOT NULL,
                platform TEXT NOT NULL,
                executors TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'online',
                last_seen TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // Technique catalog table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS techniques (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                tactic TEXT NOT NULL,
                executors TEXT NOT NULL DEFAULT '[]',
                is_safe INTEGER NOT NULL DEFAULT 0,
                detection TEXT
            )",
            [],
        )?;

        // Scenario catalog table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS scenarios (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                phases TEXT NOT NULL DEFAULT '[]'
            )",
            [],
        )?;

        // Execution runs table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                scenario_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                safe_mode INTEGER NOT NULL DEFAULT 0,
                score TEXT,
                started_at TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // Per-task results table. One row per (execution, technique, agent);
        // the row id doubles as the task id on the wire.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS results (
                id TEXT PRIMARY KEY,
                execution_id TEXT NOT NULL,
                technique_id TEXT NOT NULL,
                agent_paw TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                output TEXT,
                exit_code INTEGER,
                detected_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(execution_id, technique_id, agent_paw)
            )",
            [],
        )?;

        // Recurring schedules table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                scenario_id TEXT NOT NULL,
                agent_paw TEXT,
                frequency TEXT NOT NULL,
                cron_expr TEXT,
                safe_mode INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active',
                next_run_at TEXT,
                last_run_at TEXT,
                last_run_id TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // Schedule firing audit table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schedule_runs (
                id TEXT PRIMARY KEY,
                schedule_id TEXT NOT NULL,
                execution_id TEXT,
                status TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_results_execution ON results(execution_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_executions_scenario ON executions(scenario_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_schedule_runs_schedule ON schedule_runs(schedule_id)",
            [],
        )?;

        Ok(())
    }
}
