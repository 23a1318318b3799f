use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Cron,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Cron => "cron",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hourly" => Some(Frequency::Hourly),
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "cron" => Some(Frequency::Cron),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Active,
    Paused,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "active",
            ScheduleStatus::Paused => "paused",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(ScheduleStatus::Active),
            "paused" => Some(ScheduleStatus::Paused),
            _ => None,
        }
    }
}

/// Recurring trigger that starts an execution of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub scenario_id: String,
    /// Restrict the run to one agent; None targets every online agent
    #[serde(default)]
    pub agent_paw: Option<String>,
    pub frequency: Frequency,
    /// Five-field cron expression, required when frequency is cron
    #[serde(default)]
    pub cron_expr: Option<String>,
    pub safe_mode: bool,
    pub status: ScheduleStatus,
    #[serde(default)]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// Next fire time after `from`, advancing from the scheduled instant
    /// rather than the wall clock so a slow poll never drifts the cadence.
    ///
    /// Returns None when the frequency is cron and the expression cannot
    /// produce a future occurrence.
    pub fn next_run_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.frequency {
            Frequency::Hourly => Some(from + Duration::hours(1)),
            Frequency::Daily => Some(from + Duration::days(1)),
            Frequency::Weekly => Some(from + Duration::weeks(1)),
            Frequency::Monthly => Some(add_calendar_month(from)),
            Frequency::Cron => {
                use std::str::FromStr;
                let expr = self.cron_expr.as_deref()?;
                // cron crate wants the seconds field; five-field exprs fire
                // at second zero
                let padded = format!("0 {}", expr);
                let parsed = cron::Schedule::from_str(&padded).ok()?;
                parsed.after(&from).next()
            }
        }
    }
}

/// One calendar month forward, clamping the day when the target month is
/// shorter (Jan 31 advances to Feb 28/29).
fn add_calendar_month(from: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if from.month() == 12 {
        (from.year() + 1, 1)
    } else {
        (from.year(), from.month() + 1)
    };
    let mut day = from.day();
    loop {
        if let Some(next) = Utc
            .with_ymd_and_hms(year, month, day, from.hour(), from.minute(), from.second())
            .single()
        {
            return next;
        }
        day -= 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleRunStatus {
    Completed,
    Failed,
}

impl ScheduleRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleRunStatus::Completed => "completed",
            ScheduleRunStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "completed" => Some(ScheduleRunStatus::Completed),
            "failed" => Some(ScheduleRunStatus::Failed),
            _ => None,
        }
    }
}

/// Audit record for one firing of a schedule, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRun {
    pub id: String,
    pub schedule_id: String,
    #[serde(default)]
    pub execution_id: Option<String>,
    pub status: ScheduleRunStatus,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a schedule over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub scenario_id: String,
    /// hourly, daily, weekly, monthly or cron
    pub frequency: String,
    /// Required when frequency is cron
    #[serde(default)]
    pub cron_expr: Option<String>,
    /// Restrict runs to one agent; omit to target every online agent
    #[serde(default)]
    pub agent_paw: Option<String>,
    #[serde(default)]
    pub safe_mode: bool,
}
