//! Tests for fleet registry liveness and compatibility matching.
//!
//! The registry must treat beacon contact as the only thing that brings an
//! agent online, flip quiet agents offline on sweep (never on lookup), and
//! match techniques to agents by exact platform plus executor intersection.

use std::sync::Arc;

use chrono::{Duration, Utc};

use super::Registry;
use crate::db::Database;
use crate::models::{Agent, AgentStatus, ExecutorVariant, Technique};

fn test_registry() -> Registry {
    let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
    Registry::new(db)
}

fn make_agent(paw: &str, platform: &str, executors: &[&str]) -> Agent {
    Agent {
        paw: paw.to_string(),
        hostname: format!("{}-host", paw),
        platform: platform.to_string(),
        executors: executors.iter().map(|e| e.to_string()).collect(),
        status: AgentStatus::Online,
        last_seen: Utc::now(),
        metadata: serde_json::json!({}),
        created_at: Utc::now(),
    }
}

fn make_technique(id: &str, variants: &[(&str, Option<&str>)]) -> Technique {
    Technique {
        id: id.to_string(),
        name: format!("technique {}", id),
        tactic: "discovery".to_string(),
        executors: variants
            .iter()
            .map(|(kind, platform)| ExecutorVariant {
                name: format!("{}-variant", kind),
                kind: kind.to_string(),
                platform: platform.map(|p| p.to_string()),
                command: "whoami".to_string(),
                cleanup: None,
                timeout_secs: 60,
                elevation_required: false,
            })
            .collect(),
        is_safe: true,
        detection: None,
    }
}

// ============================================================================
// Upsert semantics
// ============================================================================

#[test]
fn upsert_creates_then_refreshes() {
    let registry = test_registry();

    let connected = registry
        .upsert(make_agent("paw-1", "linux", &["bash"]))
        .expect("first upsert");
    assert!(connected, "first contact should report the agent as connected");

    let connected = registry
        .upsert(make_agent("paw-1", "linux", &["bash", "sh"]))
        .expect("second upsert");
    assert!(!connected, "refresh of an online agent should not re-announce it");

    let agent = registry.find("paw-1").expect("agent should exist");
    assert_eq!(agent.executors, vec!["bash", "sh"], "refresh should replace capabilities");
}

#[test]
fn upsert_rejects_empty_paw() {
    let registry = test_registry();
    let err = registry.upsert(make_agent("", "linux", &["bash"]));
    assert!(err.is_err(), "empty paw must be rejected");
    assert_eq!(registry.list_all().len(), 0, "rejected upsert must not mutate the map");
}

#[test]
fn upsert_preserves_created_at_across_refreshes() {
    let registry = test_registry();

    let mut first = make_agent("paw-1", "linux", &["bash"]);
    first.created_at = Utc::now() - Duration::days(3);
    let original_created = first.created_at;
    registry.upsert(first).expect("first upsert");

    registry
        .upsert(make_agent("paw-1", "linux", &["bash"]))
        .expect("refresh");

    let agent = registry.find("paw-1").expect("agent should exist");
    assert_eq!(
        agent.created_at, original_created,
        "refresh must not rewrite the first-seen timestamp"
    );
}

#[test]
fn reconnect_after_offline_counts_as_connected() {
    let registry = test_registry();

    let mut agent = make_agent("paw-1", "linux", &["bash"]);
    agent.last_seen = Utc::now() - Duration::seconds(600);
    registry.upsert(agent).expect("upsert");

    let flipped = registry.sweep_offline(Duration::seconds(90));
    assert_eq!(flipped, vec!["paw-1"], "stale agent should be swept offline");

    let connected = registry
        .upsert(make_agent("paw-1", "linux", &["bash"]))
        .expect("re-upsert");
    assert!(connected, "beacon from an offline agent should count as a reconnect");
}

// ============================================================================
// Liveness sweep
// ============================================================================

#[test]
fn sweep_flips_only_stale_agents() {
    let registry = test_registry();

    let mut stale = make_agent("stale", "linux", &["bash"]);
    stale.last_seen = Utc::now() - Duration::seconds(400);
    registry.upsert(stale).expect("upsert stale");

    registry
        .upsert(make_agent("fresh", "linux", &["bash"]))
        .expect("upsert fresh");

    let flipped = registry.sweep_offline(Duration::seconds(90));
    assert_eq!(flipped, vec!["stale"], "only the quiet agent should flip");

    assert_eq!(
        registry.find("stale").expect("stale exists").status,
        AgentStatus::Offline
    );
    assert_eq!(
        registry.find("fresh").expect("fresh exists").status,
        AgentStatus::Online
    );
    assert_eq!(registry.online_count(), 1);
}

#[test]
fn sweep_is_idempotent_for_already_offline_agents() {
    let registry = test_registry();

    let mut stale = make_agent("stale", "linux", &["bash"]);
    stale.last_seen = Utc::now() - Duration::seconds(400);
    registry.upsert(stale).expect("upsert");

    let first = registry.sweep_offline(Duration::seconds(90));
    assert_eq!(first.len(), 1);

    let second = registry.sweep_offline(Duration::seconds(90));
    assert!(second.is_empty(), "second sweep must not report the same agent again");
}

#[test]
fn deactivate_flips_immediately() {
    let registry = test_registry();
    registry
        .upsert(make_agent("paw-1", "linux", &["bash"]))
        .expect("upsert");

    let found = registry.deactivate("paw-1").expect("deactivate");
    assert!(found);
    assert_eq!(
        registry.find("paw-1").expect("agent exists").status,
        AgentStatus::Offline
    );

    let found = registry.deactivate("nope").expect("deactivate unknown");
    assert!(!found, "unknown paw is reported, not an error");
}

// ============================================================================
// Compatibility matching
// ============================================================================

#[test]
fn compatibility_requires_platform_and_executor_match() {
    let registry = test_registry();
    registry
        .upsert(make_agent("linux-agent", "linux", &["bash", "sh"]))
        .expect("upsert");
    registry
        .upsert(make_agent("windows-agent", "windows", &["psh", "cmd"]))
        .expect("upsert");

    let windows_only = make_technique("T-win", &[("psh", Some("windows"))]);
    let matches = registry.find_online_compatible(&windows_only);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].paw, "windows-agent");

    let any_platform = make_technique("T-any", &[("bash", None), ("psh", None)]);
    let matches = registry.find_online_compatible(&any_platform);
    assert_eq!(matches.len(), 2, "unrestricted variants should match both platforms");

    // Platform matches but the agent lacks the executor kind entirely.
    let zsh_only = make_technique("T-zsh", &[("zsh", Some("linux"))]);
    let matches = registry.find_online_compatible(&zsh_only);
    assert!(matches.is_empty(), "no partial credit without the executor kind");
}

#[test]
fn offline_agents_are_never_compatible() {
    let registry = test_registry();
    registry
        .upsert(make_agent("paw-1", "linux", &["bash"]))
        .expect("upsert");
    registry.deactivate("paw-1").expect("deactivate");

    let technique = make_technique("T1", &[("bash", None)]);
    assert!(
        registry.find_online_compatible(&technique).is_empty(),
        "offline agents must not be offered to the planner"
    );
}

// ============================================================================
// Persistence round-trip
// ============================================================================

#[test]
fn load_restores_persisted_agents() {
    let db = Arc::new(Database::new(":memory:").expect("in-memory db"));

    let registry = Registry::new(db.clone());
    registry
        .upsert(make_agent("paw-1", "linux", &["bash"]))
        .expect("upsert");

    let reloaded = Registry::new(db);
    let count = reloaded.load().expect("load");
    assert_eq!(count, 1);

    let agent = reloaded.find("paw-1").expect("agent should survive reload");
    assert_eq!(agent.hostname, "paw-1-host");
    assert_eq!(agent.executors, vec!["bash"]);
}
