//! Tests for catalog seeding and lookup.

use std::sync::Arc;

use super::Catalog;
use crate::db::Database;

fn test_catalog() -> Catalog {
    let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
    Catalog::new(db)
}

#[test]
fn install_defaults_seeds_once() {
    let catalog = test_catalog();

    let installed = catalog.install_defaults().expect("seed");
    assert!(installed > 0, "fresh catalog should receive the seed set");
    assert_eq!(catalog.technique_count().expect("count"), installed as u32);

    let again = catalog.install_defaults().expect("second seed");
    assert_eq!(again, 0, "seeding must be a no-op on a populated catalog");
}

#[test]
fn baseline_scenario_references_only_seeded_techniques() {
    let catalog = test_catalog();
    catalog.install_defaults().expect("seed");

    let scenario = catalog
        .scenario("discovery-baseline")
        .expect("lookup")
        .expect("baseline scenario should exist");

    for id in scenario.technique_ids() {
        let found = catalog.technique(id).expect("lookup");
        assert!(found.is_some(), "scenario references unknown technique {}", id);
    }
}

#[test]
fn seeded_techniques_are_all_safe() {
    let catalog = test_catalog();
    catalog.install_defaults().expect("seed");

    for technique in catalog.techniques().expect("list") {
        assert!(
            technique.is_safe,
            "seed technique {} must be runnable in safe mode",
            technique.id
        );
        assert!(
            !technique.executors.is_empty(),
            "seed technique {} needs at least one executor variant",
            technique.id
        );
    }
}
