//! Beacon exchange handling.
//!
//! Every agent contact funnels through [`BeaconService::handle`]: the
//! payload is validated before anything mutates, the agent is upserted
//! into the registry, submitted results are settled through the
//! aggregator, and whatever work is queued for that paw goes back out
//! with the next-contact delay.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::dispatch::DispatchQueue;
use crate::hub::{Event, EventHub};
use crate::models::{
    Agent, AgentStatus, BeaconRequest, BeaconResponse, ResultStatus, TaskInstruction,
};
use crate::registry::Registry;

#[derive(Debug, Clone)]
pub struct BeaconConfig {
    /// Base next-contact delay handed to every agent.
    pub interval_secs: u64,
    /// Upper bound of the random spread added on top, avoiding fleet-wide
    /// contact spikes.
    pub jitter_secs: u64,
}

#[derive(Debug)]
pub enum BeaconError {
    /// The payload is malformed; nothing was mutated. Maps to 400.
    Invalid(String),
    /// Storage or internal failure mid-exchange. Maps to 500.
    Internal(String),
}

impl fmt::Display for BeaconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeaconError::Invalid(msg) => write!(f, "invalid beacon: {}", msg),
            BeaconError::Internal(msg) => write!(f, "beacon handling failed: {}", msg),
        }
    }
}

pub struct BeaconService {
    registry: Arc<Registry>,
    dispatch: Arc<DispatchQueue>,
    aggregator: Arc<Aggregator>,
    hub: EventHub,
    config: BeaconConfig,
}

impl BeaconService {
    pub fn new(
        registry: Arc<Registry>,
        dispatch: Arc<DispatchQueue>,
        aggregator: Arc<Aggregator>,
        hub: EventHub,
        config: BeaconConfig,
    ) -> Self {
        BeaconService {
            registry,
            dispatch,
            aggregator,
            hub,
            config,
        }
    }

    /// One full beacon exchange.
    pub fn handle(&self, request: BeaconRequest) -> Result<BeaconResponse, BeaconError> {
        validate(&request)?;

        let paw = if request.paw.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request.paw.clone()
        };

        let metadata = if request.metadata.is_null() {
            serde_json::json!({})
        } else {
            request.metadata.clone()
        };

        let agent = Agent {
            paw: paw.clone(),
            hostname: request.hostname.clone(),
            platform: request.platform.clone(),
            executors: request.executors.clone(),
            status: AgentStatus::Online,
            last_seen: Utc::now(),
            metadata,
            created_at: Utc::now(),
        };

        let connected = self
            .registry
            .upsert(agent.clone())
            .map_err(BeaconError::Internal)?;
        if connected {
            log::info!("Agent {} connected from {}", paw, agent.hostname);
            self.hub.publish(Event::agent_connected(&agent));
        }

        for submitted in &request.results {
            let Some(status) = parse_submitted_status(&submitted.status) else {
                continue;
            };
            self.aggregator
                .record_result(
                    &submitted.task_id,
                    status,
                    submitted.output.as_deref(),
                    submitted.exit_code,
                )
                .map_err(|e| BeaconError::Internal(e.to_string()))?;
            self.dispatch.complete(&submitted.task_id);
        }

        let tasks: Vec<TaskInstruction> = self
            .dispatch
            .take_for_agent(&paw, Utc::now())
            .into_iter()
            .map(|task| TaskInstruction {
                task_id: task.id,
                technique_id: task.technique_id,
                executor_kind: task.executor_kind,
                command: task.command,
                timeout: task.timeout_secs,
            })
            .collect();
        if !tasks.is_empty() {
            log::debug!("Handing {} tasks to agent {}", tasks.len(), paw);
        }

        Ok(BeaconResponse {
            paw,
            sleep: self.next_sleep(),
            tasks,
        })
    }

    fn next_sleep(&self) -> u64 {
        let jitter = rand::thread_rng().gen_range(0..=self.config.jitter_secs);
        self.config.interval_secs + jitter
    }
}

/// Reject malformed payloads before any state mutates.
fn validate(request: &BeaconRequest) -> Result<(), BeaconError> {
    if request.hostname.trim().is_empty() {
        return Err(BeaconError::Invalid("hostname must not be empty".into()));
    }
    if request.platform.trim().is_empty() {
        return Err(BeaconError::Invalid("platform must not be empty".into()));
    }
    for submitted in &request.results {
        if submitted.task_id.trim().is_empty() {
            return Err(BeaconError::Invalid(
                "result task_id must not be empty".into(),
            ));
        }
        if parse_submitted_status(&submitted.status).is_none() {
            return Err(BeaconError::Invalid(format!(
                "unknown result status: {}",
                submitted.status
            )));
        }
    }
    Ok(())
}

/// Agents may only submit terminal outcomes they produced themselves;
/// `pending` and `skipped` are server-side states.
fn parse_submitted_status(s: &str) -> Option<ResultStatus> {
    match ResultStatus::from_str(s) {
        Some(
            status @ (ResultStatus::Success
            | ResultStatus::Blocked
            | ResultStatus::Detected
            | ResultStatus::Failed),
        ) => Some(status),
        _ => None,
    }
}

#[cfg(test)]
mod beacon_tests;
