//! Recurring execution scheduling.

pub mod runner;

pub use runner::{Scheduler, SchedulerConfig};
