//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod agents; // agents (fleet registry persistence)
mod catalog; // techniques, scenarios
mod executions; // executions
mod results; // results (per-task outcomes, task ids on the wire)
mod schedules; // schedules, schedule_runs
