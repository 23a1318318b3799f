//! Deterministic expansion of a scenario into an ordered task plan.
//!
//! Planning is a pure function of its inputs: the same scenario, catalog
//! snapshot, target list, and safe-mode flag always yield the same task
//! sequence. No registry or storage access happens here, which keeps the
//! whole thing testable without network I/O.
//!
//! A technique nobody can run is recorded as skipped, never treated as a
//! failure; the only error case is a scenario referencing a technique id
//! the catalog cannot resolve.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{
    Agent, AgentStatus, ExecutorVariant, Plan, PlannedTask, Scenario, SkippedTechnique, Technique,
};

/// Fixed executor preference, native scripting shell first. The same table
/// applies to every technique; kinds outside it rank after it in the
/// variant's declared order.
const EXECUTOR_PRIORITY: [&str; 5] = ["psh", "cmd", "bash", "sh", "zsh"];

fn executor_rank(kind: &str) -> usize {
    EXECUTOR_PRIORITY
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(EXECUTOR_PRIORITY.len())
}

/// Choose among usable variants by the priority table, falling back to
/// declared order for ties and unknown kinds.
fn pick_variant<'a>(usable: &[&'a ExecutorVariant]) -> Option<&'a ExecutorVariant> {
    usable
        .iter()
        .enumerate()
        .min_by_key(|(idx, variant)| (executor_rank(&variant.kind), *idx))
        .map(|(_, variant)| *variant)
}

/// Expand `scenario` into tasks against `targets`, in phase order.
///
/// `catalog` must contain every technique the scenario references.
/// `targets` is the caller-supplied candidate list; when several agents
/// qualify for a technique the first qualifying entry wins, which is what
/// makes replanning stable.
pub fn build_plan(
    execution_id: &str,
    scenario: &Scenario,
    catalog: &HashMap<String, Technique>,
    targets: &[Agent],
    safe_mode: bool,
) -> Result<Plan, String> {
    let mut tasks = Vec::new();
    let mut skipped = Vec::new();
    let mut planned: HashSet<(String, String)> = HashSet::new();
    let mut sequence: u32 = 0;

    for phase in &scenario.phases {
        for technique_id in &phase.techniques {
            let technique = catalog.get(technique_id).ok_or_else(|| {
                format!(
                    "scenario {} references unknown technique {}",
                    scenario.id, technique_id
                )
            })?;

            if safe_mode && !technique.is_safe {
                skipped.push(SkippedTechnique {
                    technique_id: technique_id.clone(),
                    phase: phase.name.clone(),
                    reason: "excluded by safe mode".to_string(),
                });
                continue;
            }

            let mut selection = None;
            for agent in targets {
                if agent.status != AgentStatus::Online {
                    continue;
                }
                let usable = technique.variants_for(&agent.platform, &agent.executors);
                if let Some(variant) = pick_variant(&usable) {
                    selection = Some((agent, variant));
                    break;
                }
            }

            let (agent, variant) = match selection {
                Some(pair) => pair,
                None => {
                    skipped.push(SkippedTechnique {
                        technique_id: technique_id.clone(),
                        phase: phase.name.clone(),
                        reason: "no compatible online agent".to_string(),
                    });
                    continue;
                }
            };

            // One result per (execution, technique, agent) triple; a repeat
            // occurrence in a later phase cannot produce a second row.
            if !planned.insert((technique_id.clone(), agent.paw.clone())) {
                skipped.push(SkippedTechnique {
                    technique_id: technique_id.clone(),
                    phase: phase.name.clone(),
                    reason: "duplicate of an earlier phase".to_string(),
                });
                continue;
            }

            tasks.push(PlannedTask {
                id: Uuid::new_v4().to_string(),
                execution_id: execution_id.to_string(),
                technique_id: technique_id.clone(),
                agent_paw: agent.paw.clone(),
                executor_kind: variant.kind.clone(),
                executor_name: variant.name.clone(),
                phase: phase.name.clone(),
                sequence,
                command: variant.command.clone(),
                timeout_secs: variant.timeout_secs,
            });
            sequence += 1;
        }
    }

    Ok(Plan {
        execution_id: execution_id.to_string(),
        tasks,
        skipped,
    })
}
