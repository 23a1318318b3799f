use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "SIMSTRIKE_PORT";
    pub const GATEWAY_PORT: &str = "SIMSTRIKE_GATEWAY_PORT";
    pub const DATABASE_URL: &str = "SIMSTRIKE_DATABASE_URL";
    pub const BEACON_INTERVAL_SECS: &str = "SIMSTRIKE_BEACON_INTERVAL_SECS";
    pub const BEACON_JITTER_SECS: &str = "SIMSTRIKE_BEACON_JITTER_SECS";
    pub const SCHEDULER_POLL_SECS: &str = "SIMSTRIKE_SCHEDULER_POLL_SECS";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8443;
    pub const GATEWAY_PORT: u16 = 8444;
    pub const DATABASE_URL: &str = "./data/simstrike.db";
    pub const BEACON_INTERVAL_SECS: u64 = 30;
    pub const BEACON_JITTER_SECS: u64 = 10;
    pub const SCHEDULER_POLL_SECS: u64 = 5;
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub gateway_port: u16,
    pub database_url: String,
    /// Base next-contact delay handed to beaconing agents
    pub beacon_interval_secs: u64,
    /// Upper bound of the random spread added on top of the interval
    pub beacon_jitter_secs: u64,
    pub scheduler_poll_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parse_or(env_vars::PORT, defaults::PORT),
            gateway_port: parse_or(env_vars::GATEWAY_PORT, defaults::GATEWAY_PORT),
            database_url: env::var(env_vars::DATABASE_URL)
                .unwrap_or_else(|_| defaults::DATABASE_URL.to_string()),
            beacon_interval_secs: parse_or(
                env_vars::BEACON_INTERVAL_SECS,
                defaults::BEACON_INTERVAL_SECS,
            ),
            beacon_jitter_secs: parse_or(
                env_vars::BEACON_JITTER_SECS,
                defaults::BEACON_JITTER_SECS,
            ),
            scheduler_poll_secs: parse_or(
                env_vars::SCHEDULER_POLL_SECS,
                defaults::SCHEDULER_POLL_SECS,
            ),
        }
    }
}

/// Read a numeric env var, keeping the default when unset or unparseable.
fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
