pub mod agents;
pub mod analytics;
pub mod beacon;
pub mod executions;
pub mod health;
pub mod scenarios;
pub mod schedules;
pub mod techniques;
